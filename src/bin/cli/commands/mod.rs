pub mod ask;
pub mod clear;
pub mod index;
pub mod serve;
pub mod stats;
