pub mod analysis;
pub mod beats;
pub mod decode;
pub mod quantize;
