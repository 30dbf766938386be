//! Fixed query-language guidance strings, keyed by connector id. These are
//! data the provisioner injects into OpenAPI tool descriptions and prompt
//! templates — not prose the provisioner authors itself.

/// Guidance for a single connector: how to address the graph backend and,
/// where the connector also carries a telemetry half, how to address that.
pub struct ConnectorGuidance {
    pub query_language_description: &'static str,
    pub telemetry_query_language_description: &'static str,
}

pub fn guidance_for(connector: &str) -> ConnectorGuidance {
    match connector {
        "mock" | "mock-graph" | "mock-telemetry" => ConnectorGuidance {
            query_language_description:
                "Sends a query to the mock graph backend, which returns static network \
                 topology data for offline demonstrations and testing. Send any query \
                 string — natural language or formal syntax.",
            telemetry_query_language_description:
                "Submits a query to the mock telemetry backend. Returns sample \
                 telemetry data for offline demonstrations.",
        },
        "fabric-gql" => ConnectorGuidance {
            query_language_description:
                "GQL (ISO Graph Query Language). Uses MATCH/RETURN syntax. Example: \
                 MATCH (r:CoreRouter) RETURN r.RouterId, r.Hostname. Do NOT use GraphQL \
                 syntax — GQL is a different language. Relationships use arrow syntax: \
                 MATCH (a)-[r:connects_to]->(b). Filter with WHERE: MATCH (r:CoreRouter) \
                 WHERE r.Region = 'Sydney' RETURN r.RouterId.",
            telemetry_query_language_description: "",
        },
        "fabric-kql" => ConnectorGuidance {
            query_language_description: "",
            telemetry_query_language_description:
                "KQL (Kusto Query Language). Queries start with the table name followed \
                 by pipe operators. Example: AlertStream | where Severity == 'CRITICAL' \
                 | top 10 by Timestamp desc | project AlertId, Timestamp, SourceNodeId, \
                 AlertType. Do NOT use SQL syntax (SELECT, FROM, GROUP BY). Use KQL: \
                 project (select columns), summarize (aggregation), top (order+limit), \
                 take (limit), where (filter).",
        },
        "cosmos-gremlin" => ConnectorGuidance {
            query_language_description:
                "Gremlin traversal language. Queries are chains of traversal steps \
                 starting from g.V() or g.E(). Example: g.V().has('label', 'Device') \
                 .out('connects_to').valueMap(). Do NOT use MATCH/RETURN syntax.",
            telemetry_query_language_description: "",
        },
        "cosmos-sql" => ConnectorGuidance {
            query_language_description: "",
            telemetry_query_language_description:
                "Cosmos DB SQL dialect over a single document container, aliased `c`. \
                 Example: SELECT TOP 10 c.AlertId, c.Timestamp FROM c WHERE \
                 c.Severity = 'CRITICAL' ORDER BY c.Timestamp DESC.",
        },
        _ => ConnectorGuidance {
            query_language_description: "",
            telemetry_query_language_description: "",
        },
    }
}

/// Tool-level one-liner shown alongside the OpenAPI tool, independent of
/// the longer query-language guidance above.
pub fn graph_tool_description(connector: &str) -> &'static str {
    match connector {
        "mock" | "mock-graph" => "Query the topology graph (offline mock mode).",
        "fabric-gql" => "Execute a GQL query against the graph model to explore topology and relationships.",
        "cosmos-gremlin" => "Execute a Gremlin traversal against the graph database.",
        _ => "Query the topology graph.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_connector_falls_back_to_empty_guidance() {
        let g = guidance_for("something-unseen");
        assert!(g.query_language_description.is_empty());
    }

    #[test]
    fn fabric_gql_mentions_match_return() {
        let g = guidance_for("fabric-gql");
        assert!(g.query_language_description.contains("MATCH"));
    }
}
