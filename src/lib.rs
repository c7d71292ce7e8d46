//! synthetic South Australian addresses: weighted suburb sampling, street
//! synthesis, cached geocoding and free-text lookup

pub mod distribution;
pub mod generator;
pub mod geocode;
pub mod geocode_cache;
pub mod lookup;
pub mod record;
pub mod sampler;
pub mod suburbs;
pub mod synth;

mod utils;
