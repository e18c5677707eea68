pub mod identity;
pub mod osrm;
pub mod overpass;
