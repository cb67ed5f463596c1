//! Shared fixtures for unit tests.

use crate::{Part, Relation, System};

/// A small shop system:
///
/// ```text
/// shop (domain)
///   orders (module): orders-api, orders-db
///   catalog (module): catalog-api
///   billing (module): billing-worker
/// stripe (external)
/// ```
pub(crate) fn sample_system() -> System {
    System {
        version: "2024-05-01".into(),
        parts: vec![
            Part::domain("shop", "Shop").with_children(vec![
                Part::module("orders", "Orders").with_children(vec![
                    Part::component("orders-api", "Orders API"),
                    Part::component("orders-db", "Orders DB"),
                ]),
                Part::module("catalog", "Catalog")
                    .with_children(vec![Part::component("catalog-api", "Catalog API")]),
                Part::module("billing", "Billing")
                    .with_children(vec![Part::component("billing-worker", "Billing Worker")]),
            ]),
            Part::external("stripe", "Stripe"),
        ],
        relations: vec![
            Relation::ask("orders-api", "catalog-api").with_description("price lookup"),
            Relation::ask("orders-api", "orders-db"),
            Relation::tell("orders-api", "billing-worker").with_description("order placed"),
            Relation::ask("billing-worker", "stripe").with_resources(&["charges"]),
            Relation::listen("billing-worker", "orders-api"),
        ],
    }
}

/// Nested domains, for zone/domain level and deep-exclusion checks:
///
/// ```text
/// core (domain)
///   identity (domain)
///     auth (module): login, tokens
///   ledger (module): posting
/// edge (domain)
///   gateway (module): router
/// ```
pub(crate) fn nested_system() -> System {
    System {
        version: "nested".into(),
        parts: vec![
            Part::domain("core", "Core").with_children(vec![
                Part::domain("identity", "Identity").with_children(vec![Part::module(
                    "auth", "Auth",
                )
                .with_children(vec![
                    Part::component("login", "Login"),
                    Part::component("tokens", "Tokens"),
                ])]),
                Part::module("ledger", "Ledger")
                    .with_children(vec![Part::component("posting", "Posting")]),
            ]),
            Part::domain("edge", "Edge").with_children(vec![Part::module("gateway", "Gateway")
                .with_children(vec![Part::component("router", "Router")])]),
        ],
        relations: vec![
            Relation::ask("router", "login"),
            Relation::ask("login", "tokens"),
            Relation::tell("posting", "tokens"),
        ],
    }
}
