pub mod cancel;
pub mod close;
pub mod error;
pub mod hash;
pub mod id;
pub mod match_style;
pub mod options;
pub mod roles;
pub mod types;
pub mod uri;
