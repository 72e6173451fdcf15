pub mod fixtures;
pub mod helpers;
pub mod mock_source;
