//! Exact SQL per dialect through the public generator interface.

use pretty_assertions::assert_eq;
use relmodel::prelude::*;
use relmodel::{DeleteOptions, Returning, UpdateOptions};

fn generator(dialect: Dialect) -> Box<dyn QueryGenerator> {
    generator_for_dialect(dialect, GeneratorOptions::default())
}

// ============================================================================
// Literals and Identifiers
// ============================================================================

#[test]
fn identifiers_are_quoted_per_dialect() {
    let options = FindOptions::new().attributes(["id", "name"]);
    assert_eq!(
        generator(Dialect::Mysql).select("users", &options).unwrap(),
        "SELECT `id`, `name` FROM `users`;"
    );
    assert_eq!(
        generator(Dialect::Postgres).select("users", &options).unwrap(),
        "SELECT \"id\", \"name\" FROM \"users\";"
    );
    assert_eq!(
        generator(Dialect::Sqlite).select("users", &options).unwrap(),
        "SELECT `id`, `name` FROM `users`;"
    );
}

#[test]
fn string_literals_are_escaped_per_dialect() {
    let options = FindOptions::new().where_clause(Predicate::eq("name", "O'Brien"));
    assert_eq!(
        generator(Dialect::Mysql).select("users", &options).unwrap(),
        "SELECT * FROM `users` WHERE `users`.`name`='O\\'Brien';"
    );
    assert_eq!(
        generator(Dialect::Postgres).select("users", &options).unwrap(),
        "SELECT * FROM \"users\" WHERE \"users\".\"name\"='O''Brien';"
    );
    assert_eq!(
        generator(Dialect::Sqlite).select("users", &options).unwrap(),
        "SELECT * FROM `users` WHERE `users`.`name`='O''Brien';"
    );
}

#[test]
fn booleans_render_per_dialect() {
    let options = FindOptions::new().where_clause(Predicate::eq("active", true));
    assert_eq!(
        generator(Dialect::Mysql).select("users", &options).unwrap(),
        "SELECT * FROM `users` WHERE `users`.`active`=1;"
    );
    assert_eq!(
        generator(Dialect::Postgres).select("users", &options).unwrap(),
        "SELECT * FROM \"users\" WHERE \"users\".\"active\"=true;"
    );
    assert_eq!(
        generator(Dialect::Sqlite).select("users", &options).unwrap(),
        "SELECT * FROM `users` WHERE `users`.`active`=1;"
    );
}

#[test]
fn empty_in_list_matches_nothing_on_every_dialect() {
    let options = FindOptions::new().where_clause(Predicate::in_list("id", Vec::<i64>::new()));
    for dialect in Dialect::ALL {
        let sql = generator(dialect).select("t", &options).unwrap();
        let q = |name: &str| dialect.quote_identifier(name);
        assert_eq!(sql, format!("SELECT * FROM {} WHERE {}.{} IN (NULL);", q("t"), q("t"), q("id")));
    }
}

// ============================================================================
// Limit and Offset
// ============================================================================

#[test]
fn limit_and_offset_per_dialect() {
    let options = FindOptions::new().limit(10).offset(20);
    assert_eq!(
        generator(Dialect::Mysql).select("users", &options).unwrap(),
        "SELECT * FROM `users` LIMIT 20, 10;"
    );
    assert_eq!(
        generator(Dialect::Postgres).select("users", &options).unwrap(),
        "SELECT * FROM \"users\" LIMIT 10 OFFSET 20;"
    );
    assert_eq!(
        generator(Dialect::Sqlite).select("users", &options).unwrap(),
        "SELECT * FROM `users` LIMIT 20, 10;"
    );
}

#[test]
fn offset_without_limit_uses_unbounded_count() {
    let options = FindOptions::new().offset(5);
    assert_eq!(
        generator(Dialect::Mysql).select("users", &options).unwrap(),
        "SELECT * FROM `users` LIMIT 5, 18446744073709551615;"
    );
    assert_eq!(
        generator(Dialect::Sqlite).select("users", &options).unwrap(),
        "SELECT * FROM `users` LIMIT 5, -1;"
    );
    assert_eq!(
        generator(Dialect::Postgres).select("users", &options).unwrap(),
        "SELECT * FROM \"users\" OFFSET 5;"
    );
}

// ============================================================================
// INSERT
// ============================================================================

#[test]
fn insert_returning_only_where_supported() {
    let row = Row::new().with("name", "foo");
    let options = InsertOptions::new().returning(Returning::All);
    assert_eq!(
        generator(Dialect::Postgres).insert("users", &row, &options).unwrap(),
        "INSERT INTO \"users\" (\"name\") VALUES ('foo') RETURNING *;"
    );
    assert_eq!(
        generator(Dialect::Mysql).insert("users", &row, &options).unwrap(),
        "INSERT INTO `users` (`name`) VALUES ('foo');"
    );
    assert_eq!(
        generator(Dialect::Sqlite).insert("users", &row, &options).unwrap(),
        "INSERT INTO `users` (`name`) VALUES ('foo');"
    );
}

#[test]
fn omit_null_drops_null_columns_on_every_dialect() {
    let row = Row::new().with("name", "a").with("bio", Value::Null);
    for dialect in Dialect::ALL {
        let q = |name: &str| dialect.quote_identifier(name);
        let keep = generator(dialect).insert("users", &row, &InsertOptions::new()).unwrap();
        assert_eq!(
            keep,
            format!("INSERT INTO {} ({},{}) VALUES ('a',NULL);", q("users"), q("name"), q("bio"))
        );

        let omitting = generator_for_dialect(dialect, GeneratorOptions::default().omit_null(true));
        let sql = omitting.insert("users", &row, &InsertOptions::new()).unwrap();
        assert_eq!(sql, format!("INSERT INTO {} ({}) VALUES ('a');", q("users"), q("name")));
    }
}

#[test]
fn bulk_insert_fills_missing_columns_with_null() {
    let rows = [
        Row::new().with("name", "a"),
        Row::new().with("name", "b").with("age", 3),
    ];
    assert_eq!(
        generator(Dialect::Postgres)
            .bulk_insert("users", &rows, &InsertOptions::new())
            .unwrap(),
        "INSERT INTO \"users\" (\"name\",\"age\") VALUES ('a',NULL),('b',3);"
    );
}

// ============================================================================
// UPDATE and DELETE
// ============================================================================

#[test]
fn update_per_dialect() {
    let values = Row::new().with("name", "b").with("active", false);
    let where_clause = Predicate::eq("id", 7);
    assert_eq!(
        generator(Dialect::Mysql)
            .update("users", &values, &where_clause, &UpdateOptions::default())
            .unwrap(),
        "UPDATE `users` SET `name`='b',`active`=0 WHERE `id`=7"
    );
    assert_eq!(
        generator(Dialect::Postgres)
            .update("users", &values, &where_clause, &UpdateOptions::default())
            .unwrap(),
        "UPDATE \"users\" SET \"name\"='b',\"active\"=false WHERE \"id\"=7"
    );
}

#[test]
fn delete_limit_per_dialect() {
    let where_clause = Predicate::eq("name", "foo");
    let options = DeleteOptions::new().limit(1).primary_keys(["id"]);
    assert_eq!(
        generator(Dialect::Mysql).delete("users", &where_clause, &options).unwrap(),
        "DELETE FROM `users` WHERE `name`='foo' LIMIT 1"
    );
    assert_eq!(
        generator(Dialect::Postgres).delete("users", &where_clause, &options).unwrap(),
        "DELETE FROM \"users\" WHERE \"id\" IN (SELECT \"id\" FROM \"users\" WHERE \"name\"='foo' LIMIT 1)"
    );
    assert_eq!(
        generator(Dialect::Sqlite).delete("users", &where_clause, &options).unwrap(),
        "DELETE FROM `users` WHERE `name`='foo'"
    );
}

// ============================================================================
// Empty WHERE
//
// Older fixtures expected `WHERE 1=1` for an empty predicate. That form is
// deprecated: the canonical output has no WHERE clause at all.
// ============================================================================

#[test]
fn empty_where_on_select_emits_no_clause_and_no_1_eq_1() {
    let options = FindOptions::new().where_clause(Predicate::empty());
    for dialect in Dialect::ALL {
        let sql = generator(dialect).select("t", &options).unwrap();
        assert_eq!(sql, format!("SELECT * FROM {};", dialect.quote_identifier("t")));
        assert!(!sql.contains("1=1"), "{dialect}: {sql}");
    }
}

#[test]
fn empty_where_on_update_emits_no_clause_and_no_1_eq_1() {
    let values = Row::new().with("a", 1);
    for dialect in Dialect::ALL {
        let sql = generator(dialect)
            .update("t", &values, &Predicate::empty(), &UpdateOptions::default())
            .unwrap();
        let q = |name: &str| dialect.quote_identifier(name);
        assert_eq!(sql, format!("UPDATE {} SET {}=1", q("t"), q("a")));
        assert!(!sql.contains("WHERE"), "{dialect}: {sql}");
        assert!(!sql.contains("1=1"), "{dialect}: {sql}");
    }
}

#[test]
fn empty_where_on_delete_emits_no_clause_and_no_1_eq_1() {
    for dialect in Dialect::ALL {
        let sql = generator(dialect)
            .delete("t", &Predicate::empty(), &DeleteOptions::new())
            .unwrap();
        assert_eq!(sql, format!("DELETE FROM {}", dialect.quote_identifier("t")));
        assert!(!sql.contains("1=1"), "{dialect}: {sql}");
    }
}

// ============================================================================
// DDL
// ============================================================================

fn article() -> ModelDefinition {
    ModelDefinition::new("Article").table("articles").attribute(
        AttributeDescriptor::new("id", DataType::Integer)
            .primary_key()
            .auto_increment(),
    )
}

#[test]
fn mysql_create_table_carries_engine_options() {
    let options = GeneratorOptions::default()
        .engine("MyISAM")
        .charset("utf8mb4")
        .collate("utf8mb4_bin");
    let generator = generator_for_dialect(Dialect::Mysql, options);
    assert_eq!(
        generator.create_table(&article()).unwrap(),
        "CREATE TABLE IF NOT EXISTS `articles` (`id` INTEGER NOT NULL auto_increment, PRIMARY KEY (`id`)) ENGINE=MyISAM DEFAULT CHARSET=utf8mb4 COLLATE utf8mb4_bin;"
    );
}

#[test]
fn create_table_has_no_engine_outside_mysql() {
    for dialect in [Dialect::Postgres, Dialect::Sqlite] {
        let sql = generator(dialect).create_table(&article()).unwrap();
        assert!(!sql.contains("ENGINE"), "{dialect}: {sql}");
    }
    assert_eq!(
        generator(Dialect::Postgres).create_table(&article()).unwrap(),
        "CREATE TABLE IF NOT EXISTS \"articles\" (\"id\" SERIAL, PRIMARY KEY (\"id\"));"
    );
    assert_eq!(
        generator(Dialect::Sqlite).create_table(&article()).unwrap(),
        "CREATE TABLE IF NOT EXISTS `articles` (`id` INTEGER PRIMARY KEY AUTOINCREMENT);"
    );
}

// ============================================================================
// JSON Input
// ============================================================================

#[test]
fn options_and_predicates_load_from_json() {
    let options = GeneratorOptions::from_json(r#"{"dialect": "mysql", "omitNull": true}"#)
        .expect("generator options");
    let generator = generator_for_dialect(options.dialect, options);

    let predicate = Predicate::from_json(&serde_json::json!({
        "id": [1, 2],
        "deletedAt": null
    }))
    .expect("predicate");
    let sql = generator
        .select("users", &FindOptions::new().where_clause(predicate))
        .unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM `users` WHERE `users`.`id` IN (1,2) AND `users`.`deletedAt` IS NULL;"
    );

    let row = Row::new().with("name", "a").with("bio", Value::Null);
    assert_eq!(
        generator.insert("users", &row, &InsertOptions::new()).unwrap(),
        "INSERT INTO `users` (`name`) VALUES ('a');"
    );
}
