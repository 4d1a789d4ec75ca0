//! HTTP server with optional live reload

use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use notify_debouncer_mini::{new_debouncer, notify::RecursiveMode};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::content::{ContentLoader, FsSource};
use crate::error::{Error, ErrorKind};
use crate::templates::{SiteInfo, TemplateRenderer};
use crate::Blog;

/// Live reload script injected into HTML pages
const LIVE_RELOAD_SCRIPT: &str = r#"
<script>
(function() {
    var ws = new WebSocket('ws://' + location.host + '/__livereload');
    ws.onmessage = function(msg) {
        if (msg.data === 'reload') {
            location.reload();
        }
    };
    ws.onclose = function() {
        console.log('Live reload disconnected. Attempting to reconnect...');
        setTimeout(function() { location.reload(); }, 1000);
    };
})();
</script>
</body>
"#;

/// Server state
struct ServerState {
    loader: ContentLoader<FsSource>,
    templates: RwLock<TemplateRenderer>,
    site: SiteInfo,
    reload_tx: broadcast::Sender<()>,
    live_reload: bool,
}

impl ServerState {
    fn templates(&self) -> std::sync::RwLockReadGuard<'_, TemplateRenderer> {
        self.templates.read().unwrap_or_else(|e| e.into_inner())
    }

    fn reload_templates(&self) {
        let mut templates = self.templates.write().unwrap_or_else(|e| e.into_inner());
        match templates.reload() {
            Ok(()) => tracing::info!("Templates reloaded"),
            Err(e) => tracing::error!("Failed to reload templates: {}", e),
        }
    }
}

/// Failure of a single request
#[derive(Debug, thiserror::Error)]
enum ServerError {
    #[error(transparent)]
    Content(#[from] Error),

    #[error("worker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ServerError::Content(err) => match err.kind() {
                ErrorKind::NotFound => {
                    tracing::warn!("{}", err);
                    (StatusCode::NOT_FOUND, "Post not found")
                }
                ErrorKind::Malformed | ErrorKind::Render => {
                    tracing::error!("{}", err);
                    (StatusCode::INTERNAL_SERVER_ERROR, "Error rendering markdown")
                }
                ErrorKind::Io => {
                    tracing::error!("{}", err);
                    (StatusCode::INTERNAL_SERVER_ERROR, "Error reading posts")
                }
                ErrorKind::Template => {
                    tracing::error!("{}", err);
                    (StatusCode::INTERNAL_SERVER_ERROR, "Error rendering page")
                }
            },
            ServerError::Task(err) => {
                tracing::error!("{}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };
        (status, body).into_response()
    }
}

/// Build the application router for a blog
pub fn router(blog: &Blog) -> crate::Result<Router> {
    let (reload_tx, _) = broadcast::channel::<()>(16);
    Ok(build_router(Arc::new(new_state(blog, reload_tx, false)?), &blog.static_dir))
}

fn new_state(
    blog: &Blog,
    reload_tx: broadcast::Sender<()>,
    live_reload: bool,
) -> crate::Result<ServerState> {
    Ok(ServerState {
        loader: blog.loader(),
        templates: RwLock::new(blog.templates()?),
        site: blog.site_info(),
        reload_tx,
        live_reload,
    })
}

fn build_router(state: Arc<ServerState>, static_dir: &std::path::Path) -> Router {
    let mut app = Router::new()
        .route("/", get(index_handler))
        .route("/posts/:slug", get(post_handler));
    if state.live_reload {
        app = app.route("/__livereload", get(livereload_handler));
    }
    app.nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the server
pub async fn start(blog: &Blog, ip: &str, port: u16, watch: bool) -> Result<()> {
    // Create broadcast channel for live reload notifications
    let (reload_tx, _) = broadcast::channel::<()>(16);

    let state = Arc::new(new_state(blog, reload_tx.clone(), watch)?);
    let app = build_router(state.clone(), &blog.static_dir);

    // Parse address - handle "localhost" specially
    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    tracing::info!("Serving {:?} at http://{}:{}", blog.posts_dir, ip, port);

    // Start file watcher if watch mode is enabled
    if watch {
        tracing::info!("Live reload enabled. Watching for changes...");
        let dirs = vec![blog.posts_dir.clone(), blog.template_dir.clone()];
        let template_dir = blog.template_dir.clone();

        tokio::task::spawn_blocking(move || {
            if let Err(e) = watch_and_reload(dirs, template_dir, state, reload_tx) {
                tracing::error!("File watcher error: {}", e);
            }
        });
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Watch content directories, reload templates and notify browsers
fn watch_and_reload(
    dirs: Vec<PathBuf>,
    template_dir: PathBuf,
    state: Arc<ServerState>,
    reload_tx: broadcast::Sender<()>,
) -> Result<()> {
    let (tx, rx) = std::sync::mpsc::channel();

    // Create debouncer to avoid multiple rapid reloads
    let mut debouncer = new_debouncer(Duration::from_millis(300), tx)?;

    for dir in &dirs {
        if dir.exists() {
            debouncer.watcher().watch(dir, RecursiveMode::Recursive)?;
            tracing::debug!("Watching: {:?}", dir);
        }
    }

    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                // Editor backups and lock files
                let relevant: Vec<_> = events
                    .iter()
                    .filter(|e| {
                        e.path
                            .file_name()
                            .and_then(|n| n.to_str())
                            .map_or(true, |n| !n.starts_with(".#") && !n.ends_with('~'))
                    })
                    .collect();

                if relevant.is_empty() {
                    continue;
                }

                for event in &relevant {
                    tracing::info!("File changed: {}", event.path.display());
                }

                if relevant.iter().any(|e| e.path.starts_with(&template_dir)) {
                    state.reload_templates();
                }

                // No subscribers is fine
                let _ = reload_tx.send(());
            }
            Ok(Err(e)) => {
                tracing::error!("Watch error: {:?}", e);
            }
            Err(e) => {
                tracing::error!("Channel error: {:?}", e);
                break;
            }
        }
    }

    Ok(())
}

/// Run the synchronous content pipeline off the async executor
async fn run_blocking<F>(state: Arc<ServerState>, f: F) -> Result<String, ServerError>
where
    F: FnOnce(&ServerState) -> crate::Result<String> + Send + 'static,
{
    let page = tokio::task::spawn_blocking(move || f(&state)).await??;
    Ok(page)
}

async fn index_handler(State(state): State<Arc<ServerState>>) -> Result<Response, ServerError> {
    let page = run_blocking(state.clone(), |state| {
        let posts = state.loader.load_posts()?;
        state.templates().render_index(&state.site, &posts)
    })
    .await?;
    Ok(html_response(&state, page))
}

async fn post_handler(
    Path(slug): Path<String>,
    State(state): State<Arc<ServerState>>,
) -> Result<Response, ServerError> {
    let page = run_blocking(state.clone(), move |state| {
        let post = state.loader.load_post(&slug)?;
        state.templates().render_post(&state.site, &post)
    })
    .await?;
    Ok(html_response(&state, page))
}

fn html_response(state: &ServerState, page: String) -> Response {
    if state.live_reload {
        Html(inject_live_reload(&page)).into_response()
    } else {
        Html(page).into_response()
    }
}

/// WebSocket handler for live reload
async fn livereload_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    let reload_rx = state.reload_tx.subscribe();
    ws.on_upgrade(move |socket| handle_livereload_socket(socket, reload_rx))
}

/// Handle WebSocket connection for live reload
async fn handle_livereload_socket(mut socket: WebSocket, mut reload_rx: broadcast::Receiver<()>) {
    tracing::debug!("Live reload client connected");

    loop {
        tokio::select! {
            result = reload_rx.recv() => {
                match result {
                    Ok(_) => {
                        if socket.send(Message::Text("reload".to_string())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
        }
    }

    tracing::debug!("Live reload client disconnected");
}

/// Inject live reload script into HTML content
fn inject_live_reload(html: &str) -> String {
    if html.contains("</body>") {
        html.replacen("</body>", LIVE_RELOAD_SCRIPT, 1)
    } else {
        format!("{}{}", html, LIVE_RELOAD_SCRIPT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use axum::body::Body;
    use axum::http::Request;
    use std::fs;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn site() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        let posts = dir.path().join("markdown");
        fs::create_dir_all(&posts).unwrap();
        fs::write(
            posts.join("hello.md"),
            "---\nTitle: Hello World\nSlug: hello\nDescription: First post\n---\n# Hello\n\nWorld\n",
        )
        .unwrap();
        fs::write(posts.join("second.md"), "Title: ignored\n\nNo front-matter here.\n").unwrap();
        fs::create_dir_all(dir.path().join("static")).unwrap();
        fs::write(dir.path().join("static").join("style.css"), "body { margin: 0 }").unwrap();
        dir
    }

    fn app(dir: &TempDir, config: SiteConfig) -> Router {
        router(&Blog::with_config(dir.path(), config)).unwrap()
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_index_lists_posts() {
        let dir = site();
        let (status, body) = get(app(&dir, SiteConfig::default()), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"<a href="/posts/hello">Hello World</a>"#));
        assert!(body.contains(r#"<a href="/posts/second">second</a>"#));
        assert!(body.contains("First post"));
    }

    #[tokio::test]
    async fn test_post_page() {
        let dir = site();
        let (status, body) = get(app(&dir, SiteConfig::default()), "/posts/hello").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"<h1 id="hello">Hello</h1>"#));
        assert!(body.contains("<p>World</p>"));
        assert!(!body.contains("__livereload"));
    }

    #[tokio::test]
    async fn test_missing_post_is_404() {
        let dir = site();
        let (status, body) = get(app(&dir, SiteConfig::default()), "/posts/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "Post not found");
    }

    #[tokio::test]
    async fn test_malformed_post_is_500() {
        let dir = site();
        fs::write(
            dir.path().join("markdown").join("broken.md"),
            "---\nOrder: [1,\n---\nBody\n",
        )
        .unwrap();
        let (status, body) = get(app(&dir, SiteConfig::default()), "/posts/broken").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Error rendering markdown");
    }

    #[tokio::test]
    async fn test_broken_listing_is_500_not_fatal() {
        let dir = site();
        fs::write(
            dir.path().join("markdown").join("broken.md"),
            "---\nOrder: nope\n---\nBody\n",
        )
        .unwrap();
        let app = app(&dir, SiteConfig::default());

        let (status, _) = get(app.clone(), "/").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        // The server keeps answering other requests
        let (status, _) = get(app, "/posts/hello").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_skip_invalid_listing() {
        let dir = site();
        fs::write(
            dir.path().join("markdown").join("broken.md"),
            "---\nOrder: nope\n---\nBody\n",
        )
        .unwrap();
        let mut config = SiteConfig::default();
        config.listing.skip_invalid = true;

        let (status, body) = get(app(&dir, config), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("/posts/hello"));
        assert!(!body.contains("/posts/broken"));
    }

    #[tokio::test]
    async fn test_every_index_link_resolves() {
        let dir = site();
        let posts = dir.path().join("markdown");
        fs::create_dir_all(posts.join("2024")).unwrap();
        fs::write(posts.join("2024").join("deep.md"), "# Nested post\n").unwrap();
        fs::write(
            posts.join("file-name.md"),
            "---\nTitle: Pretty\nSlug: pretty\n---\nRenamed\n",
        )
        .unwrap();
        let app = app(&dir, SiteConfig::default());

        let (status, index) = get(app.clone(), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(index.contains(r#"href="/posts/deep""#));
        assert!(index.contains(r#"href="/posts/pretty""#));

        let links = regex::Regex::new(r#"href="(/posts/[^"]+)""#).unwrap();
        let hrefs: Vec<String> = links
            .captures_iter(&index)
            .map(|c| c[1].to_string())
            .collect();
        assert_eq!(hrefs.len(), 4);
        for href in hrefs {
            let (status, _) = get(app.clone(), &href).await;
            assert_eq!(status, StatusCode::OK, "{}", href);
        }
    }

    #[tokio::test]
    async fn test_unreadable_post_is_500() {
        let dir = site();
        // A directory with a post's name cannot be read as a file
        fs::create_dir_all(dir.path().join("markdown").join("locked.md")).unwrap();
        let (status, body) = get(app(&dir, SiteConfig::default()), "/posts/locked").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Error reading posts");
    }

    #[tokio::test]
    async fn test_split_convention() {
        let dir = tempfile::tempdir().unwrap();
        let posts = dir.path().join("markdown");
        fs::create_dir_all(&posts).unwrap();
        fs::write(
            posts.join("legacy.md"),
            "Title: Legacy Post\nDescription: Old style\n---\n# Kept\n\nBody text\n",
        )
        .unwrap();
        let config = SiteConfig {
            front_matter: crate::config::FrontMatterStyle::Split,
            ..SiteConfig::default()
        };
        let app = app(&dir, config);

        let (status, index) = get(app.clone(), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(index.contains(r#"<a href="/posts/legacy">Legacy Post</a>"#));

        let (status, body) = get(app, "/posts/legacy").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"<h1 id="kept">Kept</h1>"#));
        assert!(!body.contains("Title: Legacy Post"));
    }

    #[tokio::test]
    async fn test_static_files() {
        let dir = site();
        let (status, body) = get(app(&dir, SiteConfig::default()), "/static/style.css").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "body { margin: 0 }");
    }

    #[tokio::test]
    async fn test_edits_are_visible_without_restart() {
        let dir = site();
        let app = app(&dir, SiteConfig::default());
        fs::write(
            dir.path().join("markdown").join("hello.md"),
            "---\nTitle: Edited\n---\nChanged body\n",
        )
        .unwrap();
        let (_, body) = get(app, "/posts/hello").await;
        assert!(body.contains("Changed body"));
    }

    #[test]
    fn test_inject_live_reload() {
        let html = inject_live_reload("<html><body><p>x</p></body></html>");
        assert!(html.contains("__livereload"));
        assert!(html.ends_with("</html>"));
        assert_eq!(html.matches("</body>").count(), 1);

        let html = inject_live_reload("<p>fragment</p>");
        assert!(html.starts_with("<p>fragment</p>"));
        assert!(html.contains("__livereload"));
    }
}
