pub mod capture_ring;
pub mod circular_buffer;
