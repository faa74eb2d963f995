use std::env;

use dotenvy::dotenv;
use keel_orm::{Database, Error, Pagination};

mod records;

use records::{Account, User};

#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenv().ok();
    env_logger::init();

    let url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".to_string());
    let db = Database::builder().max_connections(1).connect(&url).await?;
    log::info!("connected with the {} dialect", db.dialect().name());

    db.migrator().register::<User>().register::<Account>().run().await?;

    for (username, age) in [("alice", 30), ("bob", 40), ("carol", 35)] {
        let mut user = User { username: username.to_string(), age, ..Default::default() };
        db.model::<User>().create(&mut user).await?;

        let mut account = Account { user_id: user.id, r#type: "credential".to_string(), ..Default::default() };
        db.model::<Account>().create(&mut account).await?;
    }

    let page = Pagination::new(0, 10)
        .paginate(db.model::<User>().where_map([("age >=", 35)]).order("\"age\" DESC"))
        .await?;
    for user in &page.data {
        println!("{} ({}) joined {}", user.username, user.age, user.created_at);
    }
    println!("{} of {} matching users", page.data.len(), page.total);

    let account = db.model::<Account>().where_map([("type", "credential")]).first().await?;
    println!("first account: #{} for user {}", account.id, account.user_id);

    db.close().await;
    Ok(())
}
