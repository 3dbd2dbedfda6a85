use anyhow::Result;
use claims::assert_ok;
use reqwest::StatusCode;

use crate::helpers::spawn_app;

#[tokio::test]
async fn greeting_returns_200_and_flushes_once() -> Result<()> {
    // Arrange
    let app = spawn_app().await?;
    let client = reqwest::Client::new();

    // Act
    let response = client.get(format!("{}/", app.address)).send().await?;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await?, "Hello, world!");
    assert_eq!(app.flushes(), 1);

    Ok(())
}

#[tokio::test]
async fn greeting_uses_query_parameters() -> Result<()> {
    // Arrange
    let app = spawn_app().await?;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(format!("{}/", app.address))
        .query(&[("name", "Ferris"), ("excited", "true")])
        .send()
        .await?;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await?, "Hello, Ferris!!");

    Ok(())
}

#[tokio::test]
async fn malformed_query_returns_400_with_message() -> Result<()> {
    // Arrange
    let app = spawn_app().await?;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(format!("{}/?excited=maybe", app.address))
        .send()
        .await?;

    // Assert
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = assert_ok!(response.text().await);
    assert!(!body.is_empty());
    assert_eq!(app.flushes(), 1);

    Ok(())
}

#[tokio::test]
async fn trace_headers_do_not_affect_the_response() -> Result<()> {
    // Arrange
    let app = spawn_app().await?;
    let client = reqwest::Client::new();

    for header in [
        "771a43a4192642f0b136d5159a501700-b7ad6b7169203331-1",
        "771a43a4192642f0b136d5159a501700-b7ad6b7169203331",
        "definitely not a trace",
    ] {
        // Act
        let response = client
            .get(format!("{}/", app.address))
            .header("sentry-trace", header)
            .send()
            .await?;

        // Assert
        assert_eq!(response.status(), StatusCode::OK, "{header}");
    }
    assert_eq!(app.flushes(), 3);

    Ok(())
}
