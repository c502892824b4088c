pub mod check_exclusion;
pub mod decode;
pub mod encode;
pub mod serve;
