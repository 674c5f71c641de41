// Boothmark: watermark compositing library for event photo booths

pub mod config;
pub mod constants;
pub mod logging;
pub mod metrics;
pub mod watermark;
