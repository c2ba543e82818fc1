// dbgraph test tree
//
// One file per component. Fixtures are inline sources; scratch directories
// come from tempfile.

pub mod test_utils;

pub mod database_tests;
pub mod graph_tests;
pub mod migration_tests;
pub mod orm_tests;
pub mod schema_tests;
