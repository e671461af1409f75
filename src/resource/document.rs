//! Document operations
//!
//! Single-document calls go through the typed client. Listing, import and
//! export use the NDJSON endpoints of [`RawApi`].

use super::listing::ListOptions;
use super::{FromParameters, HandlerTable, NodeOutput, OperationContext, OperationResult};
use crate::error::{NodeError, NodeResult};
use crate::params::Parameters;
use crate::typesense::ndjson::{encode_documents, export_records, parse_lines, read_import_input, ParsedLine};
use crate::typesense::{ExportOptions, ImportOptions, RawApi, WriteAction};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Value};

pub const HANDLERS: HandlerTable = &[
    ("create", create),
    ("upsert", upsert),
    ("get", get),
    ("update", update),
    ("delete", delete),
    ("getAll", get_all),
    ("deleteByQuery", delete_by_query),
    ("updateByQuery", update_by_query),
    ("import", import),
    ("export", export),
];

struct WriteDocument {
    collection: String,
    document: Value,
}

impl FromParameters for WriteDocument {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        Ok(Self {
            collection: params.required_str("collectionName", "Collection name")?,
            document: Value::Object(params.required_json_object("document", "Document")?),
        })
    }
}

struct DocumentRef {
    collection: String,
    id: String,
}

impl FromParameters for DocumentRef {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        Ok(Self {
            collection: params.required_str("collectionName", "Collection name")?,
            id: params.required_str("documentId", "Document ID")?,
        })
    }
}

struct UpdateDocument {
    target: DocumentRef,
    document: Value,
}

impl FromParameters for UpdateDocument {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        Ok(Self {
            target: DocumentRef::from_parameters(params)?,
            document: Value::Object(params.required_json_object("document", "Document")?),
        })
    }
}

struct ExportDocuments {
    collection: String,
    options: ExportOptions,
}

impl FromParameters for ExportDocuments {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        let options = params.collection("options");
        Ok(Self {
            collection: params.required_str("collectionName", "Collection name")?,
            options: ExportOptions {
                filter_by: options.optional_str("filterBy"),
                include_fields: options.optional_str("includeFields"),
                exclude_fields: options.optional_str("excludeFields"),
            },
        })
    }
}

struct DeleteByQuery {
    collection: String,
    filter_by: String,
    batch_size: Option<u64>,
}

impl FromParameters for DeleteByQuery {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        Ok(Self {
            collection: params.required_str("collectionName", "Collection name")?,
            filter_by: params.required_str("filterBy", "Filter by")?,
            batch_size: params.optional_u64("batchSize")?,
        })
    }
}

struct UpdateByQuery {
    collection: String,
    filter_by: String,
    document: Value,
}

impl FromParameters for UpdateByQuery {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        Ok(Self {
            collection: params.required_str("collectionName", "Collection name")?,
            filter_by: params.required_str("filterBy", "Filter by")?,
            document: Value::Object(params.required_json_object("document", "Document")?),
        })
    }
}

struct ImportDocuments {
    collection: String,
    entries: Vec<ParsedLine>,
    options: ImportOptions,
}

impl FromParameters for ImportDocuments {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        let collection = params.required_str("collectionName", "Collection name")?;
        let input = params
            .get("documents")
            .ok_or_else(|| NodeError::validation("Documents is required"))?;
        let entries = read_import_input(input)?;
        if entries.is_empty() {
            return Err(NodeError::validation("No documents to import"));
        }

        let action = match params.optional_str("importAction") {
            Some(raw) => WriteAction::from_str(&raw).ok_or_else(|| {
                NodeError::validation(format!(
                    "Import action must be one of create, upsert, update or emplace, got \"{}\"",
                    raw
                ))
            })?,
            None => WriteAction::Create,
        };

        Ok(Self {
            collection,
            entries,
            options: ImportOptions {
                action,
                batch_size: params.optional_u64("batchSize")?,
                dirty_values: params.optional_str("dirtyValues"),
            },
        })
    }
}

/// Put per-line results back in input order
///
/// Lines that never reached Typesense keep their parse error; the rest take
/// Typesense's answers in the order it returned them.
fn merge_import_results(entries: Vec<ParsedLine>, response: &str) -> Vec<Value> {
    let mut answers = parse_lines(response).into_iter().map(|parsed| match parsed.result {
        Ok(value) => value,
        Err(error) => json!({ "success": false, "error": error }),
    });

    entries
        .into_iter()
        .map(|entry| match entry.result {
            Ok(_) => answers.next().unwrap_or_else(|| {
                json!({
                    "success": false,
                    "error": "Typesense returned no result for this document",
                    "line": entry.line,
                })
            }),
            Err(error) => json!({ "success": false, "error": error, "line": entry.line }),
        })
        .collect()
}

fn create<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    write(ctx, WriteAction::Create)
}

fn upsert<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    write(ctx, WriteAction::Upsert)
}

fn write<'a>(ctx: &'a OperationContext<'a>, action: WriteAction) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = WriteDocument::from_parameters(ctx.params)?;
        Ok(NodeOutput::Single(
            ctx.client
                .write_document(&p.collection, &p.document, action)
                .await?,
        ))
    }
    .boxed()
}

fn get<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = DocumentRef::from_parameters(ctx.params)?;
        Ok(NodeOutput::Single(
            ctx.client.retrieve_document(&p.collection, &p.id).await?,
        ))
    }
    .boxed()
}

fn update<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = UpdateDocument::from_parameters(ctx.params)?;
        Ok(NodeOutput::Single(
            ctx.client
                .update_document(&p.target.collection, &p.target.id, &p.document)
                .await?,
        ))
    }
    .boxed()
}

fn delete<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = DocumentRef::from_parameters(ctx.params)?;
        Ok(NodeOutput::Single(
            ctx.client.delete_document(&p.collection, &p.id).await?,
        ))
    }
    .boxed()
}

fn get_all<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = ExportDocuments::from_parameters(ctx.params)?;
        let list = ListOptions::from_parameters(ctx.params)?;
        let text = RawApi::new(ctx.client)
            .export_documents(&p.collection, &p.options)
            .await?;
        Ok(NodeOutput::Many(list.apply(export_records(&text))))
    }
    .boxed()
}

fn delete_by_query<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = DeleteByQuery::from_parameters(ctx.params)?;
        Ok(NodeOutput::Single(
            ctx.client
                .delete_documents_by_query(&p.collection, &p.filter_by, p.batch_size)
                .await?,
        ))
    }
    .boxed()
}

fn update_by_query<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = UpdateByQuery::from_parameters(ctx.params)?;
        Ok(NodeOutput::Single(
            ctx.client
                .update_documents_by_query(&p.collection, &p.filter_by, &p.document)
                .await?,
        ))
    }
    .boxed()
}

fn import<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = ImportDocuments::from_parameters(ctx.params)?;

        let documents: Vec<Value> = p
            .entries
            .iter()
            .filter_map(|entry| entry.result.as_ref().ok().cloned())
            .collect();
        let skipped = p.entries.len() - documents.len();
        if skipped > 0 {
            tracing::warn!("Skipping {} unparsable import line(s)", skipped);
        }

        if documents.is_empty() {
            return Ok(NodeOutput::Many(merge_import_results(p.entries, "")));
        }

        let response = RawApi::new(ctx.client)
            .import_documents(&p.collection, encode_documents(&documents)?, &p.options)
            .await?;
        Ok(NodeOutput::Many(merge_import_results(p.entries, &response)))
    }
    .boxed()
}

fn export<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = ExportDocuments::from_parameters(ctx.params)?;
        let text = RawApi::new(ctx.client)
            .export_documents(&p.collection, &p.options)
            .await?;
        Ok(NodeOutput::Many(export_records(&text)))
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_input_order() {
        let entries = parse_lines("{\"id\":\"1\"}\nbroken\n{\"id\":\"2\"}");
        let response = "{\"success\":true}\n{\"success\":false,\"error\":\"Bad field\"}";
        let merged = merge_import_results(entries, response);

        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0], json!({"success": true}));
        assert_eq!(merged[1]["success"], false);
        assert_eq!(merged[1]["line"], 2);
        assert_eq!(merged[2]["error"], "Bad field");
    }

    #[test]
    fn test_import_action_validated() {
        let params = Parameters::new()
            .with("collectionName", "books")
            .with("documents", "[{\"id\":\"1\"}]")
            .with("importAction", "replace");
        assert!(ImportDocuments::from_parameters(&params).is_err());

        let params = params.with("importAction", "emplace");
        let p = ImportDocuments::from_parameters(&params).unwrap();
        assert_eq!(p.options.action, WriteAction::Emplace);
        assert_eq!(p.entries.len(), 1);
    }

    #[test]
    fn test_import_requires_documents() {
        let params = Parameters::new().with("collectionName", "books").with("documents", "[]");
        assert!(ImportDocuments::from_parameters(&params).is_err());
    }

    #[test]
    fn test_update_needs_target_and_document() {
        let params = Parameters::new()
            .with("collectionName", "books")
            .with("document", "{\"title\": \"Dune\"}");
        assert!(UpdateDocument::from_parameters(&params).is_err());

        let p = UpdateDocument::from_parameters(&params.with("documentId", "42")).unwrap();
        assert_eq!(p.target.collection, "books");
        assert_eq!(p.target.id, "42");
        assert_eq!(p.document, json!({"title": "Dune"}));
    }

    #[test]
    fn test_document_must_be_object() {
        let params = Parameters::new()
            .with("collectionName", "books")
            .with("document", "[1, 2]");
        assert!(WriteDocument::from_parameters(&params).is_err());
    }
}
