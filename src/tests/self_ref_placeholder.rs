use tempfile::TempDir;

use super::resolve_yaml;

#[test]
fn self_ref_placeholder_is_replaced_by_the_materialized_external_schema() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("schemas")).unwrap();
    std::fs::write(dir.path().join("schemas/Error.yaml"), "type: object\nproperties:\n  message:\n    type: string\n")
        .unwrap();

    let root = "\
openapi: 3.0.0
info:
  title: x
  version: '1'
components:
  schemas:
    Error:
      $ref: '#/components/schemas/Error'
paths:
  /a:
    get:
      responses:
        '500':
          description: error
          content:
            application/json:
              schema:
                $ref: './schemas/Error.yaml'
";

    let doc = resolve_yaml(root, dir.path()).unwrap();

    let error = doc.pointer("/components/schemas/Error").unwrap();
    assert_eq!(error.get("type").unwrap().as_str(), Some("object"));
    assert!(doc.pointer("/components/schemas/Error1").is_err());

    let schema_ref =
        doc.pointer("/paths/~1a/get/responses/500/content/application~1json/schema").unwrap();
    assert_eq!(schema_ref.get_ref(), Some("#/components/schemas/Error"));
}
