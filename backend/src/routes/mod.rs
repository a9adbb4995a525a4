//! Route definitions for the SCM back office

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes; everything except health requires a bearer token
pub fn api_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .nest("/inventory", inventory_routes())
        .nest("/procurement", procurement_routes())
        .nest("/request", request_routes())
        .nest("/quality", quality_routes())
        .nest("/materials", material_routes())
        .nest("/projects", project_routes())
        .nest("/notifications", notification_routes())
        .nest("/accounting", accounting_routes())
        .route("/dashboard/", get(handlers::get_dashboard))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/health", get(handlers::health_check))
        .merge(protected)
}

fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/warehouses",
            get(handlers::list_warehouses).post(handlers::create_warehouse),
        )
        .route(
            "/warehouses/:warehouse_id/locations",
            get(handlers::list_locations).post(handlers::create_location),
        )
        .route("/items", get(handlers::list_items).post(handlers::create_item))
        .route("/items/low", get(handlers::low_inventory))
        .route("/items/:item_id", get(handlers::get_item))
        .route("/items/:item_id/thresholds", put(handlers::update_thresholds))
        .route("/items/:item_id/adjust", post(handlers::adjust_quantity))
        .route("/items/:item_id/output", post(handlers::record_warehouse_output))
        .route("/items/:item_id/assign", post(handlers::assign_to_project))
        .route("/items/:item_id/transfer", post(handlers::transfer_item))
        .route("/transactions", get(handlers::list_transactions))
        .route(
            "/usage/:material_id/:project_id",
            get(handlers::material_project_usage),
        )
        // Paths used by existing clients
        .route("/items/low_inventory/", get(handlers::low_inventory))
        .route(
            "/items/:item_id/adjust_quantity/",
            post(handlers::adjust_quantity),
        )
}

fn procurement_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/suppliers",
            get(handlers::list_suppliers).post(handlers::create_supplier),
        )
        .route(
            "/suppliers/:supplier_id",
            get(handlers::get_supplier).put(handlers::update_supplier),
        )
        .route("/suppliers/:supplier_id/activate", post(handlers::activate_supplier))
        .route(
            "/suppliers/:supplier_id/deactivate",
            post(handlers::deactivate_supplier),
        )
        .route("/orders", get(handlers::list_orders).post(handlers::create_order))
        .route("/orders/due-soon", get(handlers::orders_due_soon))
        .route("/orders/:order_id", get(handlers::get_order))
        .route("/orders/:order_id/items", post(handlers::add_order_item))
        .route("/order-items/:item_id", put(handlers::update_order_item))
        .route("/orders/:order_id/submit", post(handlers::submit_order))
        .route("/orders/:order_id/approve", post(handlers::approve_order))
        .route("/orders/:order_id/reject", post(handlers::reject_order))
        .route("/orders/:order_id/send", post(handlers::send_order))
        .route("/orders/:order_id/confirm", post(handlers::confirm_order))
        .route("/orders/:order_id/cancel", post(handlers::cancel_order))
        .route("/orders/:order_id/complete", post(handlers::complete_order))
        .route("/orders/:order_id/receive", post(handlers::receive_order_items))
        // Paths used by existing clients
        .route(
            "/purchase-orders/:order_id/submit/",
            post(handlers::submit_order),
        )
        .route(
            "/purchase-orders/:order_id/approve/",
            post(handlers::approve_order),
        )
        .route("/purchase-orders/:order_id/reject/", post(handlers::reject_order))
        .route("/purchase-orders/:order_id/cancel/", post(handlers::cancel_order))
        .route(
            "/purchase-orders/:order_id/receive/",
            post(handlers::receive_order_items),
        )
}

fn request_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_requests).post(handlers::create_request))
        .route("/mine", get(handlers::my_requests))
        .route("/pending-approval", get(handlers::pending_approval))
        .route("/:request_id", get(handlers::get_request))
        .route("/:request_id/items", post(handlers::add_request_item))
        .route("/:request_id/submit", post(handlers::submit_request))
        .route("/:request_id/approve", post(handlers::approve_request))
        .route("/:request_id/reject", post(handlers::reject_request))
        .route("/:request_id/cancel", post(handlers::cancel_request))
        .route("/:request_id/fulfill", post(handlers::fulfill_request))
        .route(
            "/items/:item_id/fulfill",
            post(handlers::partially_fulfill_item),
        )
        // Paths used by existing clients
        .route("/requests/:request_id/approve/", post(handlers::approve_request))
        .route("/requests/:request_id/reject/", post(handlers::reject_request))
        .route("/requests/:request_id/cancel/", post(handlers::cancel_request))
        .route("/requests/:request_id/fulfill/", post(handlers::fulfill_request))
}

fn quality_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/standards",
            get(handlers::list_standards).post(handlers::create_standard),
        )
        .route(
            "/standards/:standard_id/deactivate",
            post(handlers::deactivate_standard),
        )
        .route("/checks", get(handlers::list_checks).post(handlers::create_check))
        .route("/checks/:check_id", get(handlers::get_check))
        .route("/checks/:check_id/items", post(handlers::add_check_item))
        .route("/check-items/:item_id", put(handlers::record_check_result))
        .route("/checks/:check_id/submit", post(handlers::submit_check))
        .route("/checks/:check_id/approve", post(handlers::approve_check))
        .route("/checks/:check_id/reject", post(handlers::reject_check))
        .route("/checks/:check_id/complete", post(handlers::complete_check))
        .route("/checks/:check_id/cancel", post(handlers::cancel_check))
}

fn material_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/categories",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .route("/", get(handlers::list_materials).post(handlers::create_material))
        .route(
            "/:material_id",
            get(handlers::get_material).put(handlers::update_material),
        )
        .route("/:material_id/activate", post(handlers::activate_material))
        .route("/:material_id/deactivate", post(handlers::deactivate_material))
}

fn project_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_projects).post(handlers::create_project))
        .route("/ending-soon", get(handlers::projects_ending_soon))
        .route(
            "/:project_id",
            get(handlers::get_project).put(handlers::update_project),
        )
}

fn accounting_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/categories",
            get(handlers::list_expense_categories).post(handlers::create_expense_category),
        )
        .route(
            "/expenses",
            get(handlers::list_expenses).post(handlers::create_expense),
        )
        .route("/expenses/summary", get(handlers::expense_summary))
        .route("/expenses/:expense_id", get(handlers::get_expense))
        .route("/expenses/:expense_id/approve", post(handlers::approve_expense))
        .route("/expenses/:expense_id/reject", post(handlers::reject_expense))
        .route("/incomes", post(handlers::create_income))
        .route("/incomes/:income_id/approve", post(handlers::approve_income))
        .route("/incomes/:income_id/reject", post(handlers::reject_income))
        .route("/projects/:project_id/incomes", get(handlers::list_project_incomes))
        .route("/projects/:project_id/balance", get(handlers::project_balance))
        .route("/entries", get(handlers::list_accounting_entries))
        .route(
            "/transactions/:transaction_id/price",
            put(handlers::set_transaction_price),
        )
        .route("/entries/:entry_id/approve", post(handlers::approve_accounting_entry))
        .route("/entries/:entry_id/reject", post(handlers::reject_accounting_entry))
}

fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_notifications))
        .route("/unread-count", get(handlers::unread_count))
        .route("/read-all", post(handlers::mark_all_read))
        .route("/:notification_id/read", post(handlers::mark_notification_read))
        .route(
            "/rules",
            get(handlers::list_alert_rules).post(handlers::create_alert_rule),
        )
        .route("/rules/:rule_id/toggle", post(handlers::toggle_alert_rule))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DatabaseConfig, InventoryConfig, JwtConfig, ServerConfig};
    use crate::services::AlertSender;
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    fn state() -> AppState {
        let config = Config {
            environment: "test".into(),
            log_json: false,
            server: ServerConfig {
                port: 0,
                host: "127.0.0.1".into(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/scm_test".into(),
                max_connections: 1,
                min_connections: 0,
                acquire_timeout_secs: 1,
                run_migrations: false,
            },
            jwt: JwtConfig {
                secret: "secret".into(),
                leeway_secs: 0,
            },
            inventory: InventoryConfig {
                alert_queue_capacity: 8,
            },
        };
        let db = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy(&config.database.url)
            .unwrap();
        let (alerts, _rx) = AlertSender::channel(8);

        AppState {
            db,
            config: Arc::new(config),
            alerts,
        }
    }

    async fn status_of(method: Method, uri: &str) -> StatusCode {
        let state = state();
        let app = api_routes(state.clone()).with_state(state);
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        app.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn client_paths_reach_authenticated_handlers() {
        let id = uuid::Uuid::nil();
        let paths = [
            (Method::GET, "/inventory/items/low_inventory/".to_string()),
            (Method::POST, format!("/inventory/items/{id}/adjust_quantity/")),
            (Method::POST, format!("/procurement/purchase-orders/{id}/receive/")),
            (Method::POST, format!("/procurement/purchase-orders/{id}/approve/")),
            (Method::POST, format!("/request/requests/{id}/fulfill/")),
            (Method::POST, format!("/request/requests/{id}/cancel/")),
            (Method::POST, format!("/inventory/items/{id}/adjust")),
        ];

        for (method, path) in paths {
            assert_eq!(
                status_of(method, &path).await,
                StatusCode::UNAUTHORIZED,
                "{path} should be routed"
            );
        }
    }

    #[tokio::test]
    async fn accounting_routes_require_a_token() {
        let id = uuid::Uuid::nil();
        let paths = [
            (Method::GET, "/accounting/expenses/summary".to_string()),
            (Method::POST, format!("/accounting/expenses/{id}/approve")),
            (Method::POST, format!("/accounting/incomes/{id}/reject")),
            (Method::GET, format!("/accounting/projects/{id}/balance")),
            (Method::PUT, format!("/accounting/transactions/{id}/price")),
        ];

        for (method, path) in paths {
            assert_eq!(
                status_of(method, &path).await,
                StatusCode::UNAUTHORIZED,
                "{path} should be routed"
            );
        }
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        assert_eq!(
            status_of(Method::GET, "/inventory/nowhere").await,
            StatusCode::NOT_FOUND
        );
    }
}
