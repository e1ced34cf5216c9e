use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "StagePass API",
        description = r#"
Ticket-booking backend: public event catalog, order placement with atomic
stock reservation, simulated payment settlement via provider callbacks, and
ticket issuance with gate-scan validation.

Authenticate with the bearer token returned by `/api/auth/login`:

```
Authorization: Bearer <token>
```

List endpoints return `{ total, page, pageSize, data }` and accept `page`,
`pageSize` (capped at 100) and a free-text `q` filter. Errors are returned
as `{ "message": "..." }` with the appropriate status code.
        "#,
    ),
    paths(
        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::events::list_events,
        crate::handlers::events::event_detail,
        crate::handlers::booking::create_order,
        crate::handlers::booking::my_orders,
        crate::handlers::booking::order_detail,
        crate::handlers::booking::cancel_order,
        crate::handlers::payments::initiate,
        crate::handlers::payments::callback,
        crate::handlers::payments::my_payments,
        crate::handlers::tickets::my_tickets,
        crate::handlers::tickets::ticket_detail,
        crate::handlers::notifications::my_notifications,
        crate::handlers::notifications::mark_read,
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration, login, profile"),
        (name = "Catalog", description = "Public event browsing"),
        (name = "Booking", description = "Order placement and cancellation"),
        (name = "Payments", description = "Payment initiation and settlement"),
        (name = "Tickets", description = "Issued tickets"),
        (name = "Notifications", description = "Per-user notifications"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}
