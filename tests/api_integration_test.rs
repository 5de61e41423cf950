mod common;

use axum::http::StatusCode;
use common::setup_app;
use serde_json::json;

#[tokio::test]
async fn test_author_crud_flow() {
    let t = setup_app().await;
    let token = t.register("writer").await;

    let id = t.create_author(&token, "Ada", "Lovelace").await;

    let (status, body) = t.get(&format!("/api/authors/{}/", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["full_name"], "Ada Lovelace");
    assert_eq!(body["books_count"], 0);

    let (status, body) = t
        .send(
            "PATCH",
            &format!("/api/authors/{}/", id),
            Some(&token),
            Some(json!({ "biography": "Wrote the first program." })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["biography"], "Wrote the first program.");
    assert_eq!(body["last_name"], "Lovelace");

    let (status, body) = t
        .send(
            "PUT",
            &format!("/api/authors/{}/", id),
            Some(&token),
            Some(json!({
                "first_name": "Augusta Ada",
                "last_name": "King",
                "email": "ada.king@example.com",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["full_name"], "Augusta Ada King");

    let (status, body) = t.get("/api/authors/?search=king", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    let (status, _) = t
        .send("DELETE", &format!("/api/authors/{}/", id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = t.get(&format!("/api/authors/{}/", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn test_book_detail_nests_relations() {
    let t = setup_app().await;
    let token = t.register("curator").await;

    let author = t.create_author(&token, "Steve", "Klabnik").await;
    let systems = t.create_category(&token, "Systems", "systems").await;
    let languages = t.create_category(&token, "Languages", "languages").await;
    let publisher = t.create_publisher(&token, "No Starch Press").await;
    let book = t
        .create_book(
            &token,
            "The Rust Programming Language",
            "9781718503106",
            author,
            &[systems, languages],
            Some(publisher),
        )
        .await;

    let (status, body) = t.get(&format!("/api/books/{}/", book), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["author"]["id"], author);
    assert_eq!(body["publisher"]["name"], "No Starch Press");
    assert_eq!(body["categories"].as_array().unwrap().len(), 2);
    assert_eq!(body["price"], "29.99");
    assert_eq!(body["status"], "available");
    assert_eq!(body["reviews_count"], 0);
    assert!(body["average_rating"].is_null());

    let (status, body) = t.get("/api/books/", None).await;
    assert_eq!(status, StatusCode::OK);
    let summary = &body["results"][0];
    assert_eq!(summary["author_name"], "Steve Klabnik");
    assert_eq!(summary["categories"], json!(["Languages", "Systems"]));

    let (_, body) = t.get(&format!("/api/authors/{}/books/", author), None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    let (_, body) = t.get(&format!("/api/categories/{}/books/", systems), None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    let (_, body) = t.get(&format!("/api/publishers/{}/books/", publisher), None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_review_aggregates_on_book() {
    let t = setup_app().await;
    let owner = t.register("owner").await;
    let author = t.create_author(&owner, "Martin", "Kleppmann").await;
    let category = t.create_category(&owner, "Data", "data").await;
    let book = t
        .create_book(&owner, "Designing Data-Intensive Applications", "9781449373320", author, &[category], None)
        .await;

    for (name, rating) in [("reader1", 4), ("reader2", 5), ("reader3", 5)] {
        let token = t.register(name).await;
        let (status, body) = t.create_review(&token, book, rating).await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        assert_eq!(body["user"], name);
    }

    let (_, body) = t.get(&format!("/api/books/{}/", book), None).await;
    assert_eq!(body["reviews_count"], 3);
    assert_eq!(body["average_rating"], 4.67);

    let (_, body) = t.get(&format!("/api/books/{}/reviews/", book), None).await;
    assert_eq!(body.as_array().unwrap().len(), 3);

    let (_, body) = t.get(&format!("/api/reviews/?book={}&rating=5", book), None).await;
    assert_eq!(body["count"], 2);
}

#[tokio::test]
async fn test_author_delete_cascades_to_books_and_reviews() {
    let t = setup_app().await;
    let token = t.register("librarian").await;
    let author = t.create_author(&token, "Brian", "Kernighan").await;
    let category = t.create_category(&token, "Classics", "classics").await;
    let book = t
        .create_book(&token, "The C Programming Language", "9780131103627", author, &[category], None)
        .await;
    let reader = t.register("reader").await;
    let (_, review) = t.create_review(&reader, book, 5).await;
    let review_id = review["id"].as_i64().unwrap();

    let (status, _) = t
        .send("DELETE", &format!("/api/authors/{}/", author), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = t.get(&format!("/api/books/{}/", book), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = t.get(&format!("/api/reviews/{}/", review_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The category itself survives
    let (status, body) = t.get(&format!("/api/categories/{}/", category), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["books_count"], 0);
}

#[tokio::test]
async fn test_publisher_delete_keeps_books() {
    let t = setup_app().await;
    let token = t.register("editor").await;
    let author = t.create_author(&token, "Donald", "Knuth").await;
    let category = t.create_category(&token, "Algorithms", "algorithms").await;
    let publisher = t.create_publisher(&token, "Addison-Wesley").await;
    let book = t
        .create_book(&token, "The Art of Computer Programming", "9780201896831", author, &[category], Some(publisher))
        .await;

    let (status, _) = t
        .send("DELETE", &format!("/api/publishers/{}/", publisher), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = t.get(&format!("/api/books/{}/", book), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["publisher"].is_null());
}

#[tokio::test]
async fn test_pagination_envelope() {
    let t = setup_app().await;
    let token = t.register("pager").await;
    for i in 0..12 {
        t.create_category(&token, &format!("Category {:02}", i), &format!("cat-{:02}", i))
            .await;
    }

    let (status, body) = t.get("/api/categories/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 12);
    assert_eq!(body["results"].as_array().unwrap().len(), 10);
    assert_eq!(body["next"], "http://localhost/api/categories/?page=2");
    assert!(body["previous"].is_null());

    let (_, body) = t.get("/api/categories/?page=2", None).await;
    assert_eq!(body["results"].as_array().unwrap().len(), 2);
    assert!(body["next"].is_null());
    assert_eq!(body["previous"], "http://localhost/api/categories/");

    let (_, body) = t.get("/api/categories/?page_size=5&page=3", None).await;
    assert_eq!(body["results"].as_array().unwrap().len(), 2);
    assert_eq!(
        body["previous"],
        "http://localhost/api/categories/?page_size=5&page=2"
    );

    let (status, body) = t.get("/api/categories/?page=99", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Invalid page.");
}

#[tokio::test]
async fn test_book_filters_and_ordering() {
    let t = setup_app().await;
    let token = t.register("filterer").await;
    let author = t.create_author(&token, "Rob", "Pike").await;
    let go = t.create_category(&token, "Go", "go").await;
    let unix = t.create_category(&token, "Unix", "unix").await;
    let first = t
        .create_book(&token, "The Go Programming Language", "9780134190440", author, &[go], None)
        .await;
    let second = t
        .create_book(&token, "The Unix Programming Environment", "9780139376818", author, &[unix], None)
        .await;

    let (status, _) = t
        .send(
            "PATCH",
            &format!("/api/books/{}/", second),
            Some(&token),
            Some(json!({ "status": "out_of_stock", "price": "12.50" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = t.get("/api/books/?status=available", None).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["id"], first);

    let (_, body) = t.get(&format!("/api/books/?categories={}", unix), None).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["id"], second);

    let (_, body) = t.get("/api/books/?search=environment", None).await;
    assert_eq!(body["count"], 1);

    let (_, body) = t.get("/api/books/?ordering=price", None).await;
    assert_eq!(body["results"][0]["id"], second);
    let (_, body) = t.get("/api/books/?ordering=-price", None).await;
    assert_eq!(body["results"][0]["id"], first);

    let (_, body) = t.get("/api/books/available/", None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_bestsellers_rank_by_review_count() {
    let t = setup_app().await;
    let token = t.register("seller").await;
    let author = t.create_author(&token, "Andrew", "Hunt").await;
    let category = t.create_category(&token, "Craft", "craft").await;
    let quiet = t
        .create_book(&token, "Quiet Book", "1111111111111", author, &[category], None)
        .await;
    let popular = t
        .create_book(&token, "Popular Book", "2222222222222", author, &[category], None)
        .await;

    for name in ["fan1", "fan2"] {
        let reader = t.register(name).await;
        let (status, _) = t.create_review(&reader, popular, 4).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let reader = t.register("fan3").await;
    t.create_review(&reader, quiet, 3).await;

    let (status, body) = t.get("/api/books/bestsellers/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["id"], popular);
    assert_eq!(body[0]["reviews_count"], 2);
    assert_eq!(body[1]["id"], quiet);
}

#[tokio::test]
async fn test_book_list_cache_invalidated_on_write() {
    let t = setup_app().await;
    let token = t.register("cacher").await;
    let author = t.create_author(&token, "Kent", "Beck").await;
    let category = t.create_category(&token, "Testing", "testing").await;
    t.create_book(&token, "Test Driven Development", "9780321146533", author, &[category], None)
        .await;

    let (_, body) = t.get("/api/books/", None).await;
    assert_eq!(body["count"], 1);

    let book = t
        .create_book(&token, "Extreme Programming Explained", "9780321278654", author, &[category], None)
        .await;
    let (_, body) = t.get("/api/books/", None).await;
    assert_eq!(body["count"], 2);

    // Reviews change the aggregates shown in the list
    let reader = t.register("critic").await;
    t.create_review(&reader, book, 2).await;
    let (_, body) = t.get("/api/books/", None).await;
    let reviewed = body["results"]
        .as_array()
        .unwrap()
        .iter()
        .find(|summary| summary["id"] == book)
        .unwrap();
    assert_eq!(reviewed["reviews_count"], 1);
    assert_eq!(reviewed["average_rating"], 2.0);
}

#[tokio::test]
async fn test_price_keeps_two_decimal_places() {
    let t = setup_app().await;
    let token = t.register("pricer").await;
    let author = t.create_author(&token, "Bjarne", "Stroustrup").await;
    let category = t.create_category(&token, "Cpp", "cpp").await;
    let book = t
        .create_book(&token, "A Tour of C++", "9780136816485", author, &[category], None)
        .await;
    let uri = format!("/api/books/{}/", book);

    let (status, body) = t
        .send("PATCH", &uri, Some(&token), Some(json!({ "price": "30.00" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["price"], "30.00");

    let (_, body) = t.get(&uri, None).await;
    assert_eq!(body["price"], "30.00");
    let (_, body) = t.get("/api/books/", None).await;
    assert_eq!(body["results"][0]["price"], "30.00");

    t.send("PATCH", &uri, Some(&token), Some(json!({ "price": "12.50" })))
        .await;
    let (_, body) = t.get(&uri, None).await;
    assert_eq!(body["price"], "12.50");
}

#[tokio::test]
async fn test_nested_book_lists_newest_first() {
    let t = setup_app().await;
    let token = t.register("sorter").await;
    let author = t.create_author(&token, "Robert", "Martin").await;
    let category = t.create_category(&token, "Practice", "practice").await;
    let publisher = t.create_publisher(&token, "Prentice Hall").await;
    let older = t
        .create_book(&token, "Agile Software Development", "9780135974445", author, &[category], Some(publisher))
        .await;
    let newer = t
        .create_book(&token, "Clean Code", "9780132350884", author, &[category], Some(publisher))
        .await;

    for uri in [
        format!("/api/authors/{}/books/", author),
        format!("/api/categories/{}/books/", category),
        format!("/api/publishers/{}/books/", publisher),
        "/api/books/available/".to_string(),
    ] {
        let (status, body) = t.get(&uri, None).await;
        assert_eq!(status, StatusCode::OK, "GET {}", uri);
        assert_eq!(body[0]["id"], newer, "GET {}", uri);
        assert_eq!(body[1]["id"], older, "GET {}", uri);
    }
}

#[tokio::test]
async fn test_versioned_prefix_and_root() {
    let t = setup_app().await;

    let (status, body) = t.get("/api/v1/books/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);

    let (status, body) = t.get("/api/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["books"], "http://localhost/api/books/");
    assert_eq!(body["reviews"], "http://localhost/api/reviews/");

    let (status, _) = t.get("/", None).await;
    assert!(status.is_redirection());
}

#[tokio::test]
async fn test_health_reports_database() {
    let t = setup_app().await;

    let (status, body) = t.get("/health/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");

    let (status, _) = t.get("/api/health/", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_admin_stats_and_export() {
    let t = setup_app().await;
    let staff = t.staff_token().await;
    let author = t.create_author(&staff, "Grace", "Hopper").await;
    let category = t.create_category(&staff, "History", "history").await;
    let book = t
        .create_book(&staff, "Compilers at Sea", "3333333333333", author, &[category], None)
        .await;
    let reader = t.register("archivist").await;
    t.create_review(&reader, book, 4).await;

    let (status, body) = t.get("/api/admin/stats/", Some(&staff)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["books"], 1);
    assert_eq!(body["reviews"], 1);
    assert_eq!(body["books_by_status"]["available"], 1);

    let (status, body) = t.get("/api/admin/users/", Some(&staff)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let request = axum::http::Request::builder()
        .uri("/api/admin/export/authors/")
        .header("Authorization", format!("Token {}", staff))
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::util::ServiceExt::oneshot(t.app.clone(), request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get("content-disposition")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("authors_"));
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let csv = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(csv.lines().next().unwrap().starts_with("id,"));
    assert!(csv.contains("Hopper"));

    let (status, _) = t.get("/api/admin/export/books/?format=json", Some(&staff)).await;
    assert_eq!(status, StatusCode::OK);
}
