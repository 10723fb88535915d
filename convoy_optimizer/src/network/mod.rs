pub mod road_network;
pub mod traffic;
