//! Minimal tether example: JSON endpoints, a route group with middleware, and
//! a subdomain-scoped route.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/api/products/203
//!   curl -X POST http://localhost:3000/api/products \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"lamp","tags":["home","light"]}'
//!   curl -H 'authorization: Bearer x' http://localhost:3000/admin/stats
//!   curl -H 'host: acme.localhost.test' http://localhost:3000/

use tether::middleware::{self, Next};
use tether::{Request, Response, Router, Server, Status};

#[tokio::main]
async fn main() -> Result<(), tether::Error> {
    tracing_subscriber::fmt::init();

    let app = Router::new()
        .middleware(middleware::trace)
        .group("api", |api| {
            api.get("products/{id}", show_product)
                .post("products", create_product)
        })
        .group("admin", |admin| admin.middleware(require_token).get("stats", stats))
        .subdomain("{company}", |tenant| tenant.get("/", tenant_home));

    Server::bind("0.0.0.0:3000").await?.serve(app).await
}

// GET /api/products/{id}
async fn show_product(req: Request, _res: Response) -> Response {
    let id = req.param("id").unwrap_or("unknown");
    Response::json(serde_json::json!({ "id": id, "name": "lamp" }).to_string().into_bytes())
}

// POST /api/products
//
// JSON bodies are flattened into form keys: `tags[0]`, `tags[1]`, ...
async fn create_product(req: Request, _res: Response) -> Response {
    let Some(name) = req.form("name") else {
        return Response::status(Status::UnprocessableContent);
    };
    let first_tag = req.form("tags[0]").unwrap_or("none");

    Response::builder()
        .status(Status::Created)
        .header("location", "/api/products/99")
        .json(format!(r#"{{"id":"99","name":"{name}","tag":"{first_tag}"}}"#).into_bytes())
}

async fn stats(_req: Request, res: Response) -> Response {
    res.with_body(tether::ContentType::Json, br#"{"requests":1}"#.to_vec())
}

async fn require_token(req: Request, res: Response, next: Next) -> Response {
    if req.header("authorization").is_none() {
        return Response::status(Status::Unauthorized);
    }
    next.run(req, res).await
}

// Any host with a subdomain label, e.g. acme.localhost.test
async fn tenant_home(req: Request, _res: Response) -> Response {
    let company = req.param("company").unwrap_or("nobody");
    Response::text(format!("welcome, {company}"))
}
