pub mod branch_opt_util;
pub mod database;
pub mod digest;
pub mod error;
pub mod gaussian;
pub mod hash_bin;
pub mod layout;
pub mod learned_index;
pub mod matrix;
pub mod params;
pub mod record;
pub mod serialization;
pub mod vector;
