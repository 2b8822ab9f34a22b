// Cross-layer unit tests
pub mod test_edge_cases;
