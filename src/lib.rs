pub mod daylight;
pub mod dataset;
pub mod fetch;
pub mod frames;
pub mod loader;
pub mod location;
pub mod observation;
pub mod output;
pub mod parser;
pub mod regularize;
pub mod snapshot;
