//! Registration, login, logout and page gating through the HTTP surface.

mod common;

use axum::http::StatusCode;
use common::{body_text, form_post, get, json_post, location, session_cookie, TestApp};

#[tokio::test]
async fn register_then_flash_is_shown_once() {
    let app = TestApp::new().await;

    let res = app.register("alice", "alice@x.com", "pw123").await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/");
    let cookie = session_cookie(&res).expect("flash travels in the session cookie");

    let res = app.send(get("/", Some(&cookie))).await;
    assert_eq!(res.status(), StatusCode::OK);
    let consumed = session_cookie(&res);
    let page = body_text(res).await;
    assert!(page.contains("Registration successful! Please login."));

    // The flash was taken, so the session is now empty and the cookie cleared.
    assert_eq!(consumed.as_deref(), Some("session="));
}

#[tokio::test]
async fn duplicate_registration_is_reported() {
    let app = TestApp::new().await;
    app.register("alice", "alice@x.com", "pw123").await;

    let res = app.register("alice", "other@x.com", "pw123").await;
    let cookie = session_cookie(&res).unwrap();
    let page = body_text(app.send(get("/", Some(&cookie))).await).await;
    assert!(page.contains("Username or email already exists!"));

    let res = app.register("bob", "alice@x.com", "pw123").await;
    let cookie = session_cookie(&res).unwrap();
    let page = body_text(app.send(get("/", Some(&cookie))).await).await;
    assert!(page.contains("Username or email already exists!"));

    let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&app.db)
        .await
        .unwrap();
    assert_eq!(users, 1);
}

#[tokio::test]
async fn missing_fields_are_rejected() {
    let app = TestApp::new().await;
    let res = app.send(form_post("/register", "username=alice&email=&password=pw", None)).await;
    assert_eq!(location(&res), "/");
    let cookie = session_cookie(&res).unwrap();
    let page = body_text(app.send(get("/", Some(&cookie))).await).await;
    assert!(page.contains("All fields are required!"));
}

#[tokio::test]
async fn unreadable_forms_redirect_with_a_flash() {
    let app = TestApp::new().await;
    let body = r#"{"username":"alice","password":"pw123"}"#;

    for req in [
        json_post("/register", body, None),
        json_post("/login", body, None),
        form_post("/login", "username=alice", None),
    ] {
        let res = app.send(req).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&res), "/");
        let cookie = session_cookie(&res).expect("flash travels in the session cookie");
        let page = body_text(app.send(get("/", Some(&cookie))).await).await;
        assert!(page.contains("All fields are required!"));
    }

    let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&app.db)
        .await
        .unwrap();
    assert_eq!(users, 0);
}

#[tokio::test]
async fn login_failures_look_the_same() {
    let app = TestApp::new().await;
    app.register("alice", "alice@x.com", "pw123").await;

    let wrong_password = app.login("alice", "nope").await;
    let unknown_user = app.login("mallory", "pw123").await;
    for res in [wrong_password, unknown_user] {
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&res), "/");
        let cookie = session_cookie(&res).unwrap();
        let page = body_text(app.send(get("/", Some(&cookie))).await).await;
        assert!(page.contains("Invalid username or password!"));
        let dashboard = app.send(get("/dashboard", Some(&cookie))).await;
        assert_eq!(location(&dashboard), "/");
    }
}

#[tokio::test]
async fn login_opens_dashboard_and_stamps_last_login() {
    let app = TestApp::new().await;
    let cookie = app.signed_in("alice").await;

    let res = app.send(get("/dashboard", Some(&cookie))).await;
    assert_eq!(res.status(), StatusCode::OK);
    let page = body_text(res).await;
    assert!(page.contains("alice"));
    assert!(page.contains("Login successful!"));

    let (created, last_login): (time::OffsetDateTime, Option<time::OffsetDateTime>) =
        sqlx::query_as("SELECT created_at, last_login FROM users WHERE username = 'alice'")
            .fetch_one(&app.db)
            .await
            .unwrap();
    assert!(last_login.expect("last_login set") > created);
}

#[tokio::test]
async fn pages_require_a_session() {
    let app = TestApp::new().await;
    for uri in ["/dashboard", "/history"] {
        let res = app.send(get(uri, None)).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(location(&res), "/", "{uri}");
    }
    for uri in ["/", "/about", "/health"] {
        assert_eq!(app.send(get(uri, None)).await.status(), StatusCode::OK, "{uri}");
    }
}

#[tokio::test]
async fn logout_clears_the_binding() {
    let app = TestApp::new().await;
    let cookie = app.signed_in("alice").await;

    let res = app.send(get("/logout", Some(&cookie))).await;
    assert_eq!(location(&res), "/");
    let after = session_cookie(&res).expect("logout rewrites the cookie");

    let res = app.send(get("/dashboard", Some(&after))).await;
    assert_eq!(location(&res), "/");

    let page = body_text(app.send(get("/", Some(&after))).await).await;
    assert!(page.contains("You have been logged out successfully!"));
}

#[tokio::test]
async fn signed_in_user_posting_login_goes_to_dashboard() {
    let app = TestApp::new().await;
    let cookie = app.signed_in("alice").await;
    app.register("bob", "bob@x.com", "pw123").await;

    let res = app
        .send(form_post("/login", "username=bob&password=pw123", Some(&cookie)))
        .await;
    assert_eq!(location(&res), "/dashboard");
    let cookie = session_cookie(&res).unwrap();
    let page = body_text(app.send(get("/dashboard", Some(&cookie))).await).await;
    assert!(page.contains("You are already logged in."));
    assert!(page.contains("<strong>alice</strong>"));
}

#[tokio::test]
async fn about_shows_model_metadata() {
    let app = TestApp::new().await;
    let page = body_text(app.send(get("/about", None)).await).await;
    assert!(page.contains("YOLOv5"));
    assert!(page.contains("95.5%"));
    assert!(page.contains("Severe ventriculomegaly"));
}
