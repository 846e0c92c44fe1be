//! HTTP surface over the materializer, the view refresher and the entity
//! tables.

mod handlers;
mod reply;

use std::convert::Infallible;
use warp::{filters::BoxedFilter, reply::Response, Filter};

use crate::duck::Store;
use crate::entity::{Additives, Entity, Microorganisms, People};
use crate::ingest::TableMaterializer;
use crate::view::ViewRefresher;

pub use reply::handle_rejection;

/// Everything a request handler needs; cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub materializer: TableMaterializer,
    pub refresher: ViewRefresher,
    pub max_upload_bytes: u64,
}

impl AppState {
    pub fn new(store: Store, max_upload_bytes: u64) -> Self {
        Self {
            materializer: TableMaterializer::new(store.clone()),
            refresher: ViewRefresher::new(store.clone()),
            store,
            max_upload_bytes,
        }
    }
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// All routes, with rejections rendered as structured error bodies.
pub fn routes(state: AppState) -> BoxedFilter<(Response,)> {
    let limit = state.max_upload_bytes;

    let health = warp::path!("health")
        .and(warp::get())
        .and_then(handlers::health);

    let add_csv = warp::path!("add" / "csv")
        .and(warp::post())
        .and(warp::multipart::form().max_length(limit))
        .and(with_state(state.clone()))
        .and_then(handlers::add_csv);

    // `..` plus `tail` so an empty or missing name still reaches the handler.
    let add_str = warp::path!("add" / "str" / ..)
        .and(warp::path::tail())
        .and(warp::post())
        .and(warp::body::content_length_limit(limit))
        .and(warp::body::bytes())
        .and(with_state(state.clone()))
        .and_then(handlers::add_str);

    let get_taxon = warp::path!("get" / String)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handlers::get_taxon);

    let get_all = warp::path!("get-all")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handlers::get_all);

    health
        .or(add_csv)
        .unify()
        .or(add_str)
        .unify()
        .or(get_taxon)
        .unify()
        .or(get_all)
        .unify()
        .or(entity_routes::<People>("people", state.clone()))
        .unify()
        .or(entity_routes::<Microorganisms>("microorganisms", state.clone()))
        .unify()
        .or(entity_routes::<Additives>("additives", state))
        .unify()
        .recover(handle_rejection)
        .unify()
        .boxed()
}

/// `GET /{prefix}/get/{id}`, `DELETE /{prefix}/delete/{id}`, `PUT /{prefix}/update`.
fn entity_routes<E: Entity>(prefix: &'static str, state: AppState) -> BoxedFilter<(Response,)> {
    let limit = state.max_upload_bytes;

    let get = warp::path(prefix)
        .and(warp::path("get"))
        .and(warp::path::param::<i64>())
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handlers::get_entity::<E>);

    let delete = warp::path(prefix)
        .and(warp::path("delete"))
        .and(warp::path::param::<i64>())
        .and(warp::path::end())
        .and(warp::delete())
        .and(with_state(state.clone()))
        .and_then(handlers::delete_entity::<E>);

    let update = warp::path(prefix)
        .and(warp::path("update"))
        .and(warp::path::end())
        .and(warp::put())
        .and(warp::body::content_length_limit(limit))
        .and(warp::body::json::<E>())
        .and(with_state(state))
        .and_then(handlers::update_entity::<E>);

    get.or(delete).unify().or(update).unify().boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::{json, Value};
    use warp::http::StatusCode;

    fn api() -> Result<(Store, BoxedFilter<(Response,)>)> {
        let store = Store::in_memory()?;
        let state = AppState::new(store.clone(), 1024 * 1024);
        Ok((store, routes(state)))
    }

    fn json_body(res: &warp::http::Response<warp::hyper::body::Bytes>) -> Result<Value> {
        Ok(serde_json::from_slice(res.body())?)
    }

    fn multipart(filename: &str, contents: &str) -> (String, String) {
        let boundary = "----microbiome-boundary";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: text/csv\r\n\r\n\
             {contents}\r\n\
             --{boundary}--\r\n"
        );
        (format!("multipart/form-data; boundary={boundary}"), body)
    }

    #[tokio::test]
    async fn text_ingestion_reports_table() -> Result<()> {
        let (store, api) = api()?;
        let res = warp::test::request()
            .method("POST")
            .path("/add/str/foo")
            .body("id,name\n1,Alice\n2,Bob")
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(&res)?, json!({"message": "foo updated"}));
        assert_eq!(store.count_rows("foo")?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn empty_table_name_is_an_input_rejection() -> Result<()> {
        let (_, api) = api()?;
        for path in ["/add/str", "/add/str/"] {
            let res = warp::test::request()
                .method("POST")
                .path(path)
                .body("id\n1")
                .reply(&api)
                .await;
            assert_eq!(res.status(), StatusCode::OK);
            assert_eq!(json_body(&res)?, json!({"error": "table name required"}));
        }
        Ok(())
    }

    #[tokio::test]
    async fn malformed_text_is_a_parse_error() -> Result<()> {
        let (_, api) = api()?;
        let res = warp::test::request()
            .method("POST")
            .path("/add/str/bad")
            .body("a,b\n1,2,3")
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(&res)?["error_type"], "ParseError");
        Ok(())
    }

    #[tokio::test]
    async fn csv_upload_renames_index_column() -> Result<()> {
        let (store, api) = api()?;
        let (content_type, body) = multipart("data.csv", ",id,name\n0,1,Alice\n1,2,Bob");
        let res = warp::test::request()
            .method("POST")
            .path("/add/csv")
            .header("content-type", content_type)
            .body(body)
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(&res)?, json!({"message": "data updated"}));

        let (cols, rows) = store.select_all("data")?;
        assert_eq!(cols, vec!["blank", "id", "name"]);
        assert_eq!(rows.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn non_csv_upload_is_an_input_rejection() -> Result<()> {
        let (_, api) = api()?;
        let (content_type, body) = multipart("notes.txt", "id\n1");
        let res = warp::test::request()
            .method("POST")
            .path("/add/csv")
            .header("content-type", content_type)
            .body(body)
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(&res)?, json!({"error": "file must be in CSV format"}));
        Ok(())
    }

    #[tokio::test]
    async fn schema_mismatch_is_a_database_error() -> Result<()> {
        let (_, api) = api()?;
        for (body, status) in [
            ("id\n1", StatusCode::OK),
            ("id,unexpected\n2,x", StatusCode::INTERNAL_SERVER_ERROR),
        ] {
            let res = warp::test::request()
                .method("POST")
                .path("/add/str/foo")
                .body(body)
                .reply(&api)
                .await;
            assert_eq!(res.status(), status);
            if status != StatusCode::OK {
                assert_eq!(json_body(&res)?["error_type"], "DatabaseError");
            }
        }
        Ok(())
    }

    #[tokio::test]
    async fn aggregate_reads_refresh_first() -> Result<()> {
        let (_, api) = api()?;
        let seed = [
            ("people", "ID_Article,ID_Group,ID_SubGroup,ID_Additive\n1,1,1.0,100"),
            ("additives", "ID_Additive,Composition,Frequency,Additive_Type\n100,inulin,daily,prebiotic"),
            ("microorganisms", "ID_microorganisms,TaxonName,ID_Group,ID_SubGroup,Change_In_Abundance\n1,Bifidobacterium,1,1.0,increase"),
        ];

        let res = warp::test::request().path("/get-all").reply(&api).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        for (table, text) in seed {
            let res = warp::test::request()
                .method("POST")
                .path(&format!("/add/str/{table}"))
                .body(text)
                .reply(&api)
                .await;
            assert_eq!(res.status(), StatusCode::OK);
        }

        let res = warp::test::request()
            .path("/get/Bifidobacterium")
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            json_body(&res)?,
            json!([{
                "taxonname": "Bifidobacterium",
                "composition": "inulin",
                "change_in_abundance": "increase",
                "frequency": "daily",
                "additive_type": "prebiotic"
            }])
        );

        let res = warp::test::request().path("/get/Unknown").reply(&api).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn entity_get_update_delete() -> Result<()> {
        let (_, api) = api()?;
        let res = warp::test::request()
            .method("POST")
            .path("/add/str/people")
            .body("ID_Article,DOI,Sex\n7,10.1/z,F")
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::OK);

        let res = warp::test::request().path("/people/get/7").reply(&api).await;
        assert_eq!(res.status(), StatusCode::OK);
        let mut person = json_body(&res)?;
        assert_eq!(person["doi"], "10.1/z");

        person["sex"] = json!("M");
        let res = warp::test::request()
            .method("PUT")
            .path("/people/update")
            .json(&person)
            .reply(&api)
            .await;
        assert_eq!(json_body(&res)?, json!({"message": "Data updated successfully"}));

        let res = warp::test::request().path("/people/get/7").reply(&api).await;
        assert_eq!(json_body(&res)?["sex"], "M");

        let res = warp::test::request()
            .method("DELETE")
            .path("/people/delete/7")
            .reply(&api)
            .await;
        assert_eq!(json_body(&res)?, json!({"message": "Data deleted successfully"}));
        Ok(())
    }

    #[tokio::test]
    async fn missing_keys_are_not_found() -> Result<()> {
        let (store, api) = api()?;
        let res = warp::test::request()
            .method("DELETE")
            .path("/additives/delete/41")
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            json_body(&res)?,
            json!({"error_type": "NotFound", "message": "Additive not found"})
        );

        let res = warp::test::request()
            .method("PUT")
            .path("/people/update")
            .json(&json!({"id_article": 404, "sex": "F"}))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(store.count_rows("people")?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn encoded_taxon_is_decoded() -> Result<()> {
        let (_, api) = api()?;
        let seed = [
            ("people", "ID_Article,ID_Group,ID_SubGroup,ID_Additive\n1,1,1.0,100"),
            ("additives", "ID_Additive,Composition,Frequency,Additive_Type\n100,inulin,daily,prebiotic"),
            ("microorganisms", "ID_microorganisms,TaxonName,ID_Group,ID_SubGroup,Change_In_Abundance\n1,Bifidobacterium longum,1,1.0,increase"),
        ];
        for (table, text) in seed {
            let res = warp::test::request()
                .method("POST")
                .path(&format!("/add/str/{table}"))
                .body(text)
                .reply(&api)
                .await;
            assert_eq!(res.status(), StatusCode::OK);
        }

        let res = warp::test::request()
            .path("/get/Bifidobacterium%20longum")
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(&res)?[0]["taxonname"], "Bifidobacterium longum");

        let res = warp::test::request().path("/get/%FF").reply(&api).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(&res)?["error_type"], "ParseError");
        Ok(())
    }

    #[tokio::test]
    async fn table_name_is_one_decoded_segment() -> Result<()> {
        let (store, api) = api()?;
        let res = warp::test::request()
            .method("POST")
            .path("/add/str/my%20table")
            .body("id\n1")
            .reply(&api)
            .await;
        assert_eq!(json_body(&res)?, json!({"message": "my table updated"}));
        assert_eq!(store.count_rows("my table")?, 1);

        for path in ["/add/str/a/b", "/add/str/a%2Fb"] {
            let res = warp::test::request()
                .method("POST")
                .path(path)
                .body("id\n1")
                .reply(&api)
                .await;
            assert_eq!(res.status(), StatusCode::NOT_FOUND);
        }
        store.with_conn(|conn| {
            assert!(crate::duck::table_columns(conn, "a/b")?.is_none());
            Ok(())
        })?;
        Ok(())
    }

    #[tokio::test]
    async fn rejections_have_readable_messages() -> Result<()> {
        let (_, api) = api()?;
        let res = warp::test::request()
            .method("PUT")
            .path("/people/update")
            .header("content-type", "application/json")
            .body("not json")
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = json_body(&res)?;
        assert_eq!(body["error_type"], "BadRequest");
        let message = body["message"].as_str().unwrap_or_default();
        assert!(message.contains("deserialize"), "{message}");
        assert!(!message.contains("Rejection"), "{message}");

        // No body means no Content-Length header.
        let res = warp::test::request()
            .method("POST")
            .path("/add/str/foo")
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::LENGTH_REQUIRED);
        assert_eq!(json_body(&res)?["error_type"], "LengthRequired");
        Ok(())
    }

    #[tokio::test]
    async fn unknown_route_has_structured_body() -> Result<()> {
        let (_, api) = api()?;
        let res = warp::test::request().path("/nowhere").reply(&api).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(&res)?["error_type"], "NotFound");

        let res = warp::test::request().path("/health").reply(&api).await;
        assert_eq!(res.status(), StatusCode::OK);
        Ok(())
    }
}
