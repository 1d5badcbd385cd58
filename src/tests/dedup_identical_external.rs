use tempfile::TempDir;

use super::resolve_yaml;

#[test]
fn two_refs_to_the_same_external_file_dedup_to_one_component() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("schemas")).unwrap();
    std::fs::write(
        dir.path().join("schemas/Error.yaml"),
        "type: object\nproperties:\n  message:\n    type: string\n",
    )
    .unwrap();

    let root = "\
openapi: 3.0.0
info:
  title: x
  version: '1'
paths:
  /a:
    get:
      responses:
        '404':
          description: not found
          content:
            application/json:
              schema:
                $ref: './schemas/Error.yaml'
  /b:
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

    let a_ref = doc.pointer("/paths/~1a/get/responses/404/content/application~1json/schema").unwrap();
    let b_ref = doc.pointer("/paths/~1b/get/responses/500/content/application~1json/schema").unwrap();
    assert_eq!(a_ref.get_ref(), Some("#/components/schemas/Error"));
    assert_eq!(b_ref.get_ref(), Some("#/components/schemas/Error"));

    let schemas = doc.pointer("/components/schemas").unwrap();
    assert_eq!(schemas.as_mapping().unwrap().len(), 1);
}
