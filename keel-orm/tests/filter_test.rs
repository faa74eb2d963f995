use keel_orm::{Database, Error, Filter, Operand, Record};

#[derive(Debug, Clone, Default, Record)]
struct Member {
    #[orm("primaryKey;autoIncrement")]
    id: i64,
    name: String,
    age: i32,
    email: Option<String>,
}

async fn setup() -> Result<Database, Error> {
    let _ = env_logger::builder().is_test(true).try_init();
    let db = Database::builder().max_connections(1).connect("sqlite::memory:").await?;
    db.migrator().register::<Member>().run().await?;

    let rows = [
        ("Alice", 28, Some("alice@example.com")),
        ("Bob", 40, None),
        ("Carol", 35, Some("carol@example.com")),
        ("David", 35, None),
    ];
    for (name, age, email) in rows {
        let mut member = Member { name: name.into(), age, email: email.map(Into::into), ..Default::default() };
        db.model::<Member>().create(&mut member).await?;
    }
    Ok(db)
}

fn names(members: &[Member]) -> Vec<&str> {
    let mut names: Vec<&str> = members.iter().map(|m| m.name.as_str()).collect();
    names.sort_unstable();
    names
}

#[tokio::test]
async fn test_greater_or_equal() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;
    let found = db.model::<Member>().where_map([("age >=", 35)]).scan().await?;
    assert_eq!(names(&found), vec!["Bob", "Carol", "David"]);
    Ok(())
}

#[tokio::test]
async fn test_in_list_ignores_missing_values() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;
    let found = db.model::<Member>().where_map([("name IN", vec!["Alice", "Carol", "Missing"])]).scan().await?;
    assert_eq!(names(&found), vec!["Alice", "Carol"]);
    Ok(())
}

#[tokio::test]
async fn test_is_null() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;
    let found = db.model::<Member>().where_map([("email IS NULL", true)]).scan().await?;
    assert_eq!(names(&found), vec!["Bob", "David"]);

    let found = db.model::<Member>().filter(Filter::is_not_null("email")).scan().await?;
    assert_eq!(names(&found), vec!["Alice", "Carol"]);
    Ok(())
}

#[tokio::test]
async fn test_empty_in_lists() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;

    let none = db.model::<Member>().where_map([("name IN", Vec::<&str>::new())]).scan().await?;
    assert!(none.is_empty());

    let all = db.model::<Member>().where_map([("name NOT IN", Vec::<&str>::new())]).scan().await?;
    assert_eq!(all.len(), 4);
    Ok(())
}

#[tokio::test]
async fn test_entries_are_anded() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;

    let found = db
        .model::<Member>()
        .where_map([("age", Operand::from(35)), ("email IS NOT NULL", Operand::from(true))])
        .scan()
        .await?;
    assert_eq!(names(&found), vec!["Carol"]);

    let found = db
        .model::<Member>()
        .where_map([("name like", "%a%")])
        .filter(Filter::not_eq("age", 35))
        .filter(Filter::less_than("age", 40))
        .scan()
        .await?;
    assert_eq!(names(&found), vec!["Alice"]);
    Ok(())
}

#[tokio::test]
async fn test_comparison_operators() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;

    let cases: [(&str, i32, &[&str]); 6] = [
        ("age >", 35, &["Bob"]),
        ("age <", 35, &["Alice"]),
        ("age <=", 35, &["Alice", "Carol", "David"]),
        ("age !=", 35, &["Alice", "Bob"]),
        ("age <>", 40, &["Alice", "Carol", "David"]),
        ("age =", 28, &["Alice"]),
    ];
    for (key, operand, expected) in cases {
        let found = db.model::<Member>().where_map([(key, operand)]).scan().await?;
        assert_eq!(names(&found), expected.to_vec(), "filter `{key}`");
    }
    Ok(())
}

#[tokio::test]
async fn test_bad_filters_fail_before_sql() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;

    let err = db.model::<Member>().where_map([("nickname", "x")]).scan().await.unwrap_err();
    assert!(matches!(err, Error::UnknownColumn { ref column, .. } if column == "nickname"));

    let err = db.model::<Member>().where_map([("name IN", "Alice")]).scan().await.unwrap_err();
    assert!(matches!(err, Error::UnsupportedOperator(_)));

    let err = db.model::<Member>().where_map([("age >", vec![1, 2])]).count().await.unwrap_err();
    assert!(matches!(err, Error::UnsupportedOperator(_)));
    Ok(())
}
