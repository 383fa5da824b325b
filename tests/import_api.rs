//! Bulk import over multipart uploads, checked through the catalog endpoints.

mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{app, get, items_uri, upload, LIBRARY, OTHER_LIBRARY};

fn import_uri(library: &str, kind: &str) -> String {
    format!("/api/v1/libraries/{}/import?kind={}", library, kind)
}

fn option_names(columns: &Value, column_id: &str) -> Vec<String> {
    columns["variants"]["book"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["id"] == column_id)
        .unwrap()["options"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["name"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_import_shares_named_entities_between_rows() {
    let (app, _) = app().await;
    let csv = "Acc. No.,Title of the Book,Author,Ref\n\
               1,Good Omens,Jane Doe/John Roe,\n\
               2,Mort,Jane Doe,Ref\n";

    let (status, report) = upload(&app, &import_uri(LIBRARY, "item"), "file", csv).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["kind"], "item");
    assert_eq!(report["processed"], 2);
    assert_eq!(report["created"], 2);
    assert_eq!(report["failed"], 0);

    let (_, columns) = get(&app, &format!("/api/v1/libraries/{}/columns?variant=book", LIBRARY)).await;
    assert_eq!(option_names(&columns, "authors"), vec!["Jane Doe", "John Roe"]);

    let (_, rows) = get(&app, &format!("{}?show=book", items_uri(LIBRARY))).await;
    assert_eq!(rows[0]["title"], "Good Omens");
    assert_eq!(rows[0]["authors"], json!(["Jane Doe", "John Roe"]));
    assert_eq!(rows[0]["reference"], false);
    assert_eq!(rows[1]["title"], "Mort");
    assert_eq!(rows[1]["authors"], json!(["Jane Doe"]));
    assert_eq!(rows[1]["reference"], true);
    assert_eq!(rows[1]["status"], "IN");
}

#[tokio::test]
async fn test_import_keeps_authors_per_library() {
    let (app, _) = app().await;
    let csv = "Acc. No.,Title of the Book,Author\n1,Mort,Jane Doe\n";
    upload(&app, &import_uri(LIBRARY, "item"), "file", csv).await;

    let (_, columns) = get(&app, &format!("/api/v1/libraries/{}/columns?variant=book", OTHER_LIBRARY)).await;
    assert!(option_names(&columns, "authors").is_empty());
}

#[tokio::test]
async fn test_text_cells_keep_their_exact_spelling() {
    let (app, _) = app().await;
    let csv = "Acc. No.,Title of the Book,Edition/Year,Remarks,Level,Price\n\
               1,Dune,2.10,12345678901234567890123,1.50,350.5\n";

    let (_, report) = upload(&app, &import_uri(LIBRARY, "item"), "file", csv).await;
    assert_eq!(report["created"], 1);

    let (_, rows) = get(&app, &format!("{}?show=book", items_uri(LIBRARY))).await;
    assert_eq!(rows[0]["edition"], "2.10");
    assert_eq!(rows[0]["remarks"], "12345678901234567890123");
    assert_eq!(rows[0]["level"], "1.50");
    assert_eq!(rows[0]["purchase_price"], 350.5);
}

#[tokio::test]
async fn test_invalid_row_is_reported_and_skipped() {
    let (app, _) = app().await;
    let csv = "Acc. No.,Title of the Book\n\
               1,Mort\n\
               x12,Dune\n\
               3,Emma\n";

    let (status, report) = upload(&app, &import_uri(LIBRARY, "i"), "file", csv).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["processed"], 3);
    assert_eq!(report["created"], 2);
    assert_eq!(report["failed"], 1);

    let failure = &report["failures"][0];
    assert_eq!(failure["status"], "failed");
    assert_eq!(failure["line"], 3);
    assert_eq!(failure["key"], "x12");

    let (_, rows) = get(&app, &items_uri(LIBRARY)).await;
    let titles: Vec<&str> = rows.as_array().unwrap().iter().map(|r| r["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["Mort", "Emma"]);
}

#[tokio::test]
async fn test_duplicate_accession_number_in_upload_fails_one_row() {
    let (app, _) = app().await;
    let csv = "Acc. No.,Title of the Book\n1,Mort\n1,Dune\n";

    let (_, report) = upload(&app, &import_uri(LIBRARY, "item"), "file", csv).await;
    assert_eq!(report["created"], 1);
    assert_eq!(report["failures"][0]["line"], 3);
}

#[tokio::test]
async fn test_user_import_validates_email() {
    let (app, _) = app().await;
    let csv = "Name,Email address,Gender\n\
               Ada,ada@example.org,F\n\
               Bob,not-an-email,M\n\
               Ada Again,ada@example.org,F\n";

    let (status, report) = upload(&app, &import_uri(LIBRARY, "user"), "file", csv).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["kind"], "user");
    assert_eq!(report["created"], 1);
    assert_eq!(report["failed"], 2);
    assert_eq!(report["failures"][0]["key"], "not-an-email");
    assert_eq!(report["failures"][1]["line"], 4);
}

#[tokio::test]
async fn test_invalid_kind_is_bad_request() {
    let (app, _) = app().await;
    let (status, body) = upload(&app, &import_uri(LIBRARY, "items"), "file", "Name\nAda\n").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 18);
}

#[tokio::test]
async fn test_import_into_unknown_library_is_not_found() {
    let (app, _) = app().await;
    let (status, _) = upload(&app, &import_uri("nowhere", "item"), "file", "Acc. No.\n1\n").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_upload_field_is_bad_request() {
    let (app, _) = app().await;
    let (status, _) = upload(&app, &import_uri(LIBRARY, "item"), "attachment", "Acc. No.\n1\n").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
