use tempfile::TempDir;

use super::resolve_yaml;

/// A `components.schemas` entry that's itself a no-fragment external ref to
/// the same file an operation schema references must materialize that
/// file's content under its own name, not short-circuit to a dangling
/// self-ref.
#[test]
fn the_defining_schema_entry_materializes_instead_of_short_circuiting() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("schemas")).unwrap();
    std::fs::write(
        dir.path().join("schemas/User.yaml"),
        "type: object\nproperties:\n  id:\n    type: string\n",
    )
    .unwrap();

    let root = "\
openapi: 3.0.0
info:
  title: x
  version: '1'
components:
  schemas:
    User:
      $ref: './schemas/User.yaml'
paths:
  /users:
    get:
      responses:
        '200':
          description: ok
          content:
            application/json:
              schema:
                $ref: './schemas/User.yaml'
";

    let doc = resolve_yaml(root, dir.path()).unwrap();

    let user = doc.pointer("/components/schemas/User").unwrap();
    assert_eq!(user.get("type").unwrap().as_str(), Some("object"));
    assert_eq!(
        user.pointer("/properties/id/type").unwrap().as_str(),
        Some("string")
    );

    let schema_ref = doc
        .pointer("/paths/~1users/get/responses/200/content/application~1json/schema")
        .unwrap();
    assert_eq!(schema_ref.get_ref(), Some("#/components/schemas/User"));
}
