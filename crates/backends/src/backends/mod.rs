pub mod document_sql;
pub mod fabric_gql;
pub mod fabric_kql;
pub mod fabric_workspace;
pub mod gremlin;
pub mod mock_graph;
pub mod mock_telemetry;
