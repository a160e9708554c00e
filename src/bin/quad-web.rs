//! quad-web: server binary for the social graph and messaging core.

#[tokio::main]
async fn main() {
    quad::web::run().await;
}
