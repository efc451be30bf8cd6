//! Network and decoder interfaces, with a compact reference network.

mod decoder;
mod network;
mod point_bev;

pub use decoder::{ArgmaxDecoder, DecodeParams, DecodedPanoptic, PanopticDecoder};
pub use network::{PanopticNetwork, PanopticOutput, SampleOutput};
pub use point_bev::PointBevNet;
