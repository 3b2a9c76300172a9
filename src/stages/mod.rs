//! Pipeline stages
//!
//! Each stage is a short sequential program. Stages talk to each other only
//! through files on disk and the tracking store.

pub mod prepare;
pub mod train;
pub mod evaluate;
