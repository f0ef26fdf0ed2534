pub mod algebra;
pub mod errors;
pub mod safe_math;
pub mod u256_num;
pub mod utils;
