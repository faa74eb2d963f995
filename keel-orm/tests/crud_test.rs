use chrono::{DateTime, NaiveDate, Utc};
use keel_orm::{Changes, Database, Error, ErrorKind, Filter, Pagination, Record, Value};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Record)]
struct Person {
    #[orm("primaryKey;autoIncrement")]
    id: i64,
    #[orm("size:64;not null;index")]
    name: String,
    age: i32,
    email: Option<String>,
    score: f64,
    active: bool,
    token: Uuid,
    born: Option<NaiveDate>,
    #[orm("default:CURRENT_TIMESTAMP")]
    created_at: DateTime<Utc>,
    #[orm("-")]
    scratch: Vec<String>,
}

fn person(name: &str, age: i32, email: Option<&str>) -> Person {
    Person {
        name: name.to_string(),
        age,
        email: email.map(str::to_string),
        score: f64::from(age) / 2.0,
        active: age % 2 == 0,
        token: Uuid::new_v4(),
        ..Default::default()
    }
}

async fn setup() -> Result<Database, Error> {
    let _ = env_logger::builder().is_test(true).try_init();
    let db = Database::builder().max_connections(1).connect("sqlite::memory:").await?;
    db.migrator().register::<Person>().run().await?;
    Ok(db)
}

async fn seed(db: &Database) -> Result<Vec<Person>, Error> {
    let mut people = vec![
        person("Alice", 30, Some("alice@example.com")),
        person("Bob", 40, None),
        person("Carol", 35, Some("carol@example.com")),
        person("David", 35, None),
    ];
    for p in &mut people {
        db.model::<Person>().create(p).await?;
    }
    Ok(people)
}

#[tokio::test]
async fn test_create_then_find_by_id_round_trips() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;

    let mut alice = person("Alice", 30, Some("alice@example.com"));
    alice.born = NaiveDate::from_ymd_opt(1994, 5, 17);
    alice.scratch = vec!["not stored".to_string()];
    let result = db.model::<Person>().create(&mut alice).await?;

    assert_eq!(result.rows_affected, 1);
    assert!(alice.id > 0, "generated key is written back");
    assert_ne!(alice.created_at, DateTime::<Utc>::default(), "database default is re-selected");

    let found = db.model::<Person>().find_by_id(alice.id).await?;
    assert_eq!(found.name, "Alice");
    assert_eq!(found.email.as_deref(), Some("alice@example.com"));
    assert_eq!(found.token, alice.token);
    assert_eq!(found.born, alice.born);
    assert_eq!(found.created_at, alice.created_at);
    assert!(found.scratch.is_empty());
    assert_eq!(Person { scratch: Vec::new(), ..alice }, found);
    Ok(())
}

#[tokio::test]
async fn test_find_by_id_reports_not_found() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;

    let err = db.model::<Person>().find_by_id(999_i64).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = db.model::<Person>().where_map([("name", "nobody")]).first().await.unwrap_err();
    assert!(err.is_not_found());
    Ok(())
}

#[tokio::test]
async fn test_find_resets_output_and_orders() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;
    seed(&db).await?;

    let mut out = vec![person("stale", 1, None)];
    db.model::<Person>()
        .filter(Filter::greater_than("age", 30))
        .order("\"age\" DESC, \"name\" ASC")
        .find(&mut out)
        .await?;
    let names: Vec<&str> = out.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Bob", "Carol", "David"]);

    let first = db.model::<Person>().first().await?;
    assert_eq!(first.name, "Alice", "first() orders by primary key");

    let none = db.model::<Person>().where_map([("age >", 100)]).scan().await?;
    assert!(none.is_empty(), "no match is an empty success");
    Ok(())
}

#[tokio::test]
async fn test_limit_and_offset() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;
    seed(&db).await?;

    let page = db.model::<Person>().order("\"id\" ASC").limit(2).offset(1).scan().await?;
    assert_eq!(page.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(), vec!["Bob", "Carol"]);

    let tail = db.model::<Person>().order("\"id\" ASC").offset(3).scan().await?;
    assert_eq!(tail.len(), 1);
    assert_eq!(tail[0].name, "David");

    let nothing = db.model::<Person>().limit(0).scan().await?;
    assert!(nothing.is_empty(), "limit(0) returns no rows");

    let everyone = db.model::<Person>().limit(u64::MAX).offset(1).scan().await?;
    assert_eq!(everyone.len(), 3, "oversized limits are clamped");
    let beyond = db.model::<Person>().offset(u64::MAX).scan().await?;
    assert!(beyond.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_created_key_is_usable_immediately() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;

    let mut first = person("Frank", 20, None);
    db.model::<Person>().create(&mut first).await?;
    let mut second = person("Grace", 21, None);
    db.model::<Person>().create(&mut second).await?;
    assert!(first.id > 0);
    assert_eq!(second.id, first.id + 1);

    let result = db.model::<Person>().updates(&mut first, Changes::from([("age".to_string(), Value::Int(22))])).await?;
    assert_eq!(result.rows_affected, 1);
    assert_eq!(db.model::<Person>().delete(&mut second).await?.rows_affected, 1);
    assert_eq!(db.model::<Person>().count().await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_bool_columns_round_trip_and_filter() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;
    let people = seed(&db).await?;

    let stored = db.model::<Person>().find_by_id(people[0].id).await?;
    assert!(stored.active);
    let stored = db.model::<Person>().find_by_id(people[2].id).await?;
    assert!(!stored.active);

    let active = db.model::<Person>().where_map([("active", true)]).order("\"name\"").scan().await?;
    assert_eq!(active.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(), vec!["Alice", "Bob"]);
    assert_eq!(db.model::<Person>().where_map([("active", false)]).count().await?, 2);
    Ok(())
}

#[tokio::test]
async fn test_count_and_example_record() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;
    seed(&db).await?;

    assert_eq!(db.model::<Person>().count().await?, 4);
    assert_eq!(db.model::<Person>().where_map([("email IS NOT NULL", true)]).count().await?, 2);

    let example = Person { age: 35, ..Default::default() };
    let matches = db.model::<Person>().where_record(&example).order("\"name\"").scan().await?;
    assert_eq!(matches.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(), vec!["Carol", "David"]);
    Ok(())
}

#[tokio::test]
async fn test_updates_skip_primary_key() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;
    let mut people = seed(&db).await?;
    let bob = &mut people[1];
    let original_id = bob.id;

    let changes = Changes::from([
        ("id".to_string(), Value::BigInt(original_id + 100)),
        ("age".to_string(), Value::Int(41)),
        ("email".to_string(), Value::from("bob@example.com")),
    ]);
    let result = db.model::<Person>().updates(bob, changes).await?;

    assert_eq!(result.rows_affected, 1);
    assert_eq!(bob.id, original_id);
    assert_eq!(bob.age, 41);

    let stored = db.model::<Person>().find_by_id(original_id).await?;
    assert_eq!(stored.age, 41);
    assert_eq!(stored.email.as_deref(), Some("bob@example.com"));
    assert!(db.model::<Person>().find_by_id(original_id + 100).await.unwrap_err().is_not_found());
    Ok(())
}

#[tokio::test]
async fn test_updates_rejects_bad_input() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;
    let mut people = seed(&db).await?;

    let only_key = Changes::from([("id".to_string(), Value::BigInt(7))]);
    let err = db.model::<Person>().updates(&mut people[0], only_key).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));

    let unknown = Changes::from([("nickname".to_string(), Value::from("al"))]);
    let err = db.model::<Person>().updates(&mut people[0], unknown).await.unwrap_err();
    assert!(matches!(err, Error::UnknownColumn { ref column, .. } if column == "nickname"));

    let mut unsaved = person("Eve", 22, None);
    let err = db
        .model::<Person>()
        .updates(&mut unsaved, Changes::from([("age".to_string(), Value::Int(23))]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ZeroPrimaryKey { .. }));
    assert_eq!(err.kind(), ErrorKind::Usage);

    let mut gone = Person { id: 12_345, ..person("Ghost", 1, None) };
    let result = db.model::<Person>().updates(&mut gone, Changes::from([("age".to_string(), Value::Int(2))])).await?;
    assert_eq!(result.rows_affected, 0, "a missing row is not an error");
    assert_eq!(gone.age, 1, "record is untouched when nothing matched");
    Ok(())
}

#[tokio::test]
async fn test_delete_guard_and_delete() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;
    let mut people = seed(&db).await?;

    let mut unsaved = person("Zed", 50, None);
    let err = db.model::<Person>().delete(&mut unsaved).await.unwrap_err();
    match err {
        Error::ZeroPrimaryKey { field, operation, .. } => {
            assert_eq!(field, "id");
            assert_eq!(operation, "delete");
        }
        other => panic!("expected ZeroPrimaryKey, got {other:?}"),
    }
    assert_eq!(db.model::<Person>().count().await?, 4, "guard fires before any SQL");

    let result = db.model::<Person>().delete(&mut people[0]).await?;
    assert_eq!(result.rows_affected, 1);
    assert_eq!(db.model::<Person>().count().await?, 3);

    let again = db.model::<Person>().delete(&mut people[0]).await?;
    assert_eq!(again.rows_affected, 0);
    Ok(())
}

#[tokio::test]
async fn test_pagination() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;
    seed(&db).await?;

    let page = Pagination::new(1, 3).paginate(db.model::<Person>().order("\"id\"")).await?;
    assert_eq!(page.total, 4);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].name, "David");

    let filtered = Pagination::default().paginate(db.model::<Person>().where_map([("age", 35)])).await?;
    assert_eq!(filtered.total, 2);
    assert_eq!(filtered.data.len(), 2);

    let unbounded = Pagination::new(0, u64::MAX).paginate(db.model::<Person>()).await?;
    assert_eq!(unbounded.data.len(), 4);
    assert_eq!(unbounded.total_pages, 1);
    Ok(())
}

#[tokio::test]
async fn test_unique_violation_is_wrapped_with_context() -> Result<(), Box<dyn std::error::Error>> {
    #[derive(Debug, Default, Record)]
    struct Account {
        #[orm("primaryKey;autoIncrement")]
        id: i64,
        #[orm("unique")]
        login: String,
    }

    let db = setup().await?;
    db.migrator().register::<Account>().run().await?;

    let mut first = Account { login: "root".into(), ..Default::default() };
    db.model::<Account>().create(&mut first).await?;
    let mut second = Account { login: "root".into(), ..Default::default() };
    let err = db.model::<Account>().create(&mut second).await.unwrap_err();

    assert!(matches!(err, Error::Execution { operation: "create", ref record, .. } if record == "Account"));
    assert_eq!(err.kind(), ErrorKind::Execution);
    Ok(())
}
