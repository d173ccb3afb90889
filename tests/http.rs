use std::net::SocketAddr;
use std::time::Duration;

use tether::middleware::Next;
use tether::{RenderError, Request, Response, Router, Server, ServerConfig, Status};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct TestServer {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<Result<(), tether::Error>>,
}

async fn start(server: Server, app: Router) -> TestServer {
    let addr = server.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(server.serve_with_shutdown(app, async {
        let _ = stopped.await;
    }));
    TestServer { addr, stop, task }
}

async fn spawn(app: Router) -> TestServer {
    start(Server::bind("127.0.0.1:0").await.unwrap(), app).await
}

/// Sends `raw`, then reads until the server closes the connection.
async fn exchange(addr: SocketAddr, raw: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw).await.unwrap();
    let mut out = Vec::new();
    stream.read_to_end(&mut out).await.unwrap();
    String::from_utf8(out).unwrap()
}

fn body(response: &str) -> &str {
    response.split_once("\r\n\r\n").map_or("", |(_, body)| body)
}

async fn show_product(req: Request, _res: Response) -> Response {
    Response::text(format!("product {}", req.param("id").unwrap_or("-")))
}

async fn echo_form(req: Request, _res: Response) -> Response {
    let mut fields: Vec<_> = req.form_fields().iter().map(|(k, v)| format!("{k}={v}")).collect();
    fields.sort();
    Response::text(fields.join("&"))
}

#[tokio::test]
async fn path_parameter_reaches_the_handler() {
    let server = spawn(Router::new().get("/api/products/{id}", show_product)).await;

    let res = exchange(server.addr, b"GET /api/products/203 HTTP/1.1\r\nHost: shop.test\r\n\r\n").await;

    assert!(res.starts_with("HTTP/1.1 200 OK\r\n"), "{res}");
    assert!(res.contains("Content-Length: 11\r\n"));
    assert_eq!(body(&res), "product 203");
}

#[tokio::test]
async fn unmatched_route_is_not_found() {
    let server = spawn(Router::new().get("users", show_product)).await;

    let res = exchange(server.addr, b"GET /nowhere HTTP/1.1\r\n\r\n").await;

    assert_eq!(res, "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n");
}

#[tokio::test]
async fn request_split_across_reads_is_reassembled() {
    let server = spawn(Router::new().post("login", echo_form)).await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream
        .write_all(b"POST /login HTTP/1.1\r\nContent-Type: application/x-www-form-urlencoded\r\n")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    stream.write_all(b"Content-Length: 18\r\n\r\nuser=ada&").await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    stream.write_all(b"pass=x%21").await.unwrap();

    let mut out = Vec::new();
    stream.read_to_end(&mut out).await.unwrap();
    let res = String::from_utf8(out).unwrap();
    assert_eq!(body(&res), "pass=x!&user=ada");
}

#[tokio::test]
async fn json_body_is_flattened_into_the_form() {
    let server = spawn(Router::new().post("users", echo_form)).await;

    let payload = r#"{"user":1,"profile":{"name":"ada"},"tags":["a","b"]}"#;
    let raw = format!(
        "POST /users HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{payload}",
        payload.len()
    );
    let res = exchange(server.addr, raw.as_bytes()).await;

    assert_eq!(body(&res), "profile[name]=ada&tags[0]=a&tags[1]=b&user=1");
}

#[tokio::test]
async fn query_string_is_decoded() {
    async fn search(req: Request, _res: Response) -> String {
        format!("{}|{}", req.path(), req.query("q").unwrap_or(""))
    }
    let server = spawn(Router::new().get("search", search)).await;

    let res = exchange(server.addr, b"GET /search?q=red%20lamp HTTP/1.1\r\n\r\n").await;

    assert_eq!(body(&res), "search|red lamp");
}

#[tokio::test]
async fn malformed_request_is_dropped_without_response() {
    let server = spawn(Router::new().get("*", show_product)).await;

    let bad_header = exchange(server.addr, b"GET / HTTP/1.1\r\nNoColonHere\r\n\r\n").await;
    let bad_line = exchange(server.addr, b"GET /\r\n\r\n").await;

    assert!(bad_header.is_empty());
    assert!(bad_line.is_empty());
}

#[tokio::test]
async fn unknown_method_is_not_allowed() {
    let server = spawn(Router::new().get("*", show_product)).await;

    let res = exchange(server.addr, b"BREW /pot HTTP/1.1\r\n\r\n").await;

    assert!(res.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"), "{res}");
}

#[tokio::test]
async fn oversized_request_is_refused() {
    let cfg = ServerConfig { max_request_size: 256, ..ServerConfig::default() };
    let server = Server::bind("127.0.0.1:0").await.unwrap().with_config(cfg);
    let server = start(server, Router::new().post("upload", echo_form)).await;

    let res = exchange(server.addr, b"POST /upload HTTP/1.1\r\nContent-Length: 100000\r\n\r\n").await;

    assert!(res.starts_with("HTTP/1.1 413 Content Too Large\r\n"), "{res}");
}

#[tokio::test]
async fn middleware_can_short_circuit() {
    async fn require_token(req: Request, res: Response, next: Next) -> Response {
        if req.header("authorization").is_none() {
            return Response::status(Status::Unauthorized);
        }
        next.run(req, res).await
    }
    let app = Router::new().group("admin", |admin| {
        admin.middleware(require_token).get("stats", show_product)
    });
    let server = spawn(app).await;

    let denied = exchange(server.addr, b"GET /admin/stats HTTP/1.1\r\n\r\n").await;
    let allowed = exchange(
        server.addr,
        b"GET /admin/stats HTTP/1.1\r\nAuthorization: Bearer t\r\n\r\n",
    )
    .await;

    assert!(denied.starts_with("HTTP/1.1 401 Unauthorized\r\n"), "{denied}");
    assert!(allowed.starts_with("HTTP/1.1 200 OK\r\n"), "{allowed}");
}

#[tokio::test]
async fn subdomain_is_captured_from_host() {
    async fn tenant(req: Request, _res: Response) -> String {
        req.param("company").unwrap_or("-").to_owned()
    }
    let server = spawn(Router::new().subdomain("{company}", |r| r.get("/", tenant))).await;

    let tenant_res = exchange(server.addr, b"GET / HTTP/1.1\r\nHost: grpc.tracker.com\r\n\r\n").await;
    let apex_res = exchange(server.addr, b"GET / HTTP/1.1\r\nHost: tracker.com\r\n\r\n").await;

    assert_eq!(body(&tenant_res), "grpc");
    assert!(apex_res.starts_with("HTTP/1.1 404"), "{apex_res}");
}

#[tokio::test]
async fn view_annotation_is_rendered() {
    async fn page(_req: Request, _res: Response) -> Response {
        Response::view("greeting", serde_json::json!({ "name": "ada" }))
    }
    fn render(name: &str, data: &serde_json::Value) -> Result<Vec<u8>, RenderError> {
        match name {
            "greeting" => Ok(format!("<p>hi {}</p>", data["name"].as_str().unwrap_or("")).into_bytes()),
            other => Err(RenderError::NotFound(other.to_owned())),
        }
    }
    let server = Server::bind("127.0.0.1:0").await.unwrap().with_views(render);
    let server = start(server, Router::new().get("/", page)).await;

    let res = exchange(server.addr, b"GET / HTTP/1.1\r\n\r\n").await;

    assert!(res.contains("Content-Type: text/html; charset=utf-8\r\n"), "{res}");
    assert_eq!(body(&res), "<p>hi ada</p>");
}

#[tokio::test]
async fn response_headers_are_sorted_and_length_is_last() {
    async fn created(_req: Request, res: Response) -> Response {
        res.with_status(Status::Created)
            .with_header("x-trace", "t1")
            .with_header("location", "/items/1")
            .with_body(tether::ContentType::Json, b"{}".to_vec())
    }
    let server = spawn(Router::new().post("items", created)).await;

    let res = exchange(server.addr, b"POST /items HTTP/1.0\r\nContent-Length: 0\r\n\r\n").await;

    assert_eq!(
        res,
        "HTTP/1.0 201 Created\r\n\
         Content-Type: application/json\r\n\
         Location: /items/1\r\n\
         X-Trace: t1\r\n\
         Content-Length: 2\r\n\
         \r\n\
         {}"
    );
}

#[tokio::test]
async fn shutdown_signal_stops_the_server() {
    let server = spawn(Router::new().get("*", show_product)).await;
    let _ = exchange(server.addr, b"GET / HTTP/1.1\r\n\r\n").await;

    server.stop.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(2), server.task).await.unwrap().unwrap();

    assert!(result.is_ok());
    assert!(TcpStream::connect(server.addr).await.is_err());
}
