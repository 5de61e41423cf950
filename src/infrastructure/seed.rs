//! Demo data and bootstrap accounts

use chrono::{NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use sea_orm::*;

use crate::domain::DomainError;
use crate::infrastructure::auth::hash_password;
use crate::models::{BookStatus, author, book, book_category, category, publisher, review, user};

const CATEGORIES: &[(&str, &str, &str)] = &[
    ("Python", "python", "Python programming language"),
    ("JavaScript", "javascript", "Web development with JS"),
    ("Java", "java", "Enterprise Java"),
    ("C++", "cpp", "Systems programming with C++"),
    ("Go", "go", "Go programming language"),
    ("Rust", "rust", "Systems programming with Rust"),
    ("Data Science", "data-science", "Data analysis & ML"),
    ("Web Development", "web-dev", "HTML/CSS/JS + frameworks"),
    ("DevOps", "devops", "CI/CD, containers, cloud"),
    ("Algorithms", "algorithms", "Data structures & algorithms"),
];

const PUBLISHERS: &[(&str, &str, &str, &str)] = &[
    ("O'Reilly Media", "Sebastopol", "USA", "https://www.oreilly.com"),
    ("Manning Publications", "Shelter Island", "USA", "https://www.manning.com"),
    ("Pragmatic Bookshelf", "Raleigh", "USA", "https://pragprog.com"),
    ("Packt Publishing", "Birmingham", "UK", "https://www.packtpub.com"),
    ("No Starch Press", "San Francisco", "USA", "https://nostarch.com"),
    ("Addison-Wesley", "Boston", "USA", "https://www.pearson.com"),
];

struct SeedBook {
    title: &'static str,
    author: &'static str,
    isbn: &'static str,
    published: (i32, u32, u32),
    pages: i32,
    price_cents: i64,
}

const fn seed_book(
    title: &'static str,
    author: &'static str,
    isbn: &'static str,
    published: (i32, u32, u32),
    pages: i32,
    price_cents: i64,
) -> SeedBook {
    SeedBook {
        title,
        author,
        isbn,
        published,
        pages,
        price_cents,
    }
}

const BOOKS: &[SeedBook] = &[
    seed_book("Fluent Python", "Luciano Ramalho", "9781491946008", (2015, 3, 15), 792, 4999),
    seed_book("Python Crash Course", "Eric Matthes", "9781593279285", (2019, 5, 1), 544, 2999),
    seed_book("Automate the Boring Stuff with Python", "Al Sweigart", "9781593275993", (2015, 4, 14), 504, 2499),
    seed_book("Effective Python", "Brett Slatkin", "9780134034287", (2015, 3, 10), 256, 3999),
    seed_book("Python Cookbook", "David Beazley", "9781449340377", (2013, 5, 10), 706, 5499),
    seed_book("Eloquent JavaScript", "Marijn Haverbeke", "9781593279509", (2018, 12, 4), 472, 2999),
    seed_book("You Don't Know JS: Scope & Closures", "Kyle Simpson", "9781449335581", (2014, 3, 28), 98, 1999),
    seed_book("JavaScript: The Good Parts", "Douglas Crockford", "9780596517748", (2008, 5, 1), 176, 2499),
    seed_book("Learning React", "Alex Banks & Eve Porcello", "9781492051724", (2020, 6, 9), 350, 3999),
    seed_book("Effective Java", "Joshua Bloch", "9780134685991", (2017, 12, 27), 412, 4499),
    seed_book("Java: The Complete Reference", "Herbert Schildt", "9781260440232", (2019, 2, 1), 1248, 5999),
    seed_book("C++ Primer", "Stanley B. Lippman", "9780321714111", (2012, 8, 6), 976, 6499),
    seed_book("Accelerated C++", "Andrew Koenig", "9780201703535", (2000, 8, 25), 352, 3999),
    seed_book("The Go Programming Language", "Alan A. A. Donovan", "9780134190441", (2015, 10, 26), 400, 4499),
    seed_book("Go Programming Language", "John P. Baugh", "9780134190560", (2016, 3, 15), 380, 3999),
    seed_book("The Rust Programming Language", "Steve Klabnik", "9781593278284", (2019, 6, 12), 560, 3499),
    seed_book("Programming Rust", "Jim Blandy", "9781491927284", (2021, 2, 9), 738, 4999),
    seed_book("Hands-On Machine Learning with Scikit-Learn", "Aurélien Géron", "9781492032649", (2019, 8, 15), 856, 5999),
    seed_book("Python for Data Analysis", "Wes McKinney", "9781491957660", (2017, 10, 1), 550, 4499),
    seed_book("Clean Code", "Robert C. Martin", "9780132350884", (2008, 8, 1), 464, 4499),
    seed_book("The DevOps Handbook", "Gene Kim", "9781942788003", (2016, 10, 1), 480, 3499),
    seed_book("Site Reliability Engineering", "Betsy Beyer", "9781491929127", (2016, 4, 15), 552, 4999),
    seed_book("Introduction to Algorithms", "Thomas H. Cormen", "9780262033848", (2009, 7, 31), 1312, 9999),
    seed_book("Grokking Algorithms", "Aditya Bhargava", "9781617292231", (2016, 5, 15), 256, 2999),
];

const REVIEW_TITLES: &[&str] = &[
    "Excellent resource!",
    "Clear explanations",
    "A must-read for beginners",
    "Helped me land a job",
    "Too verbose",
    "Great examples",
    "Outdated",
    "Perfect reference",
    "Loved the exercises",
    "Worth every penny",
];

const REVIEW_COMMENTS: &[&str] = &[
    "The code samples are spot-on and easy to follow.",
    "I finally understood closures thanks to this book.",
    "A bit dense but packed with knowledge.",
    "Highly recommended for interview prep.",
    "Examples are in Python 2 - needs an update.",
    "Best book I've read on the topic.",
    "Wish it had more diagrams.",
];

const MIN_REVIEWERS: usize = 3;

/// What a seeding run added
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub users: usize,
    pub categories: usize,
    pub publishers: usize,
    pub authors: usize,
    pub books: usize,
    pub reviews: usize,
}

/// Outcome of a superuser bootstrap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuperuserOutcome {
    Created,
    AlreadyExists,
}

/// Category names matched from keywords in a book title
pub fn categories_for_title(title: &str) -> Vec<&'static str> {
    let lower = title.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric() && c != '+')
        .filter(|w| !w.is_empty())
        .collect();
    let has_word = |word: &str| words.contains(&word);
    let has_any = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    let mut names = Vec::new();
    if has_any(&["python", "django", "flask"]) {
        names.push("Python");
    }
    if has_any(&["javascript", "react", "node"]) {
        names.push("JavaScript");
    }
    if has_word("java") {
        names.push("Java");
    }
    if lower.contains("c++") {
        names.push("C++");
    }
    if has_word("go") {
        names.push("Go");
    }
    if has_word("rust") {
        names.push("Rust");
    }
    if has_any(&["machine learning", "data"]) || has_word("ml") {
        names.push("Data Science");
    }
    if has_any(&["web", "html", "css"]) {
        names.push("Web Development");
    }
    if has_any(&["devops", "docker", "kubernetes"]) {
        names.push("DevOps");
    }
    if has_any(&["algorithm", "data structure"]) {
        names.push("Algorithms");
    }

    if names.is_empty() {
        names.push("Web Development");
    }
    names
}

/// Split "First Middle Last" into first and last name
fn split_name(full: &str) -> (String, String) {
    let mut parts = full.split_whitespace();
    let first = parts.next().unwrap_or_default().to_string();
    let last = parts.last().unwrap_or_default().to_string();
    (first, last)
}

fn seed_date((year, month, day): (i32, u32, u32)) -> Result<NaiveDate, DomainError> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| DomainError::Internal(format!("invalid seed date {}-{}-{}", year, month, day)))
}

async fn get_or_create_user(
    db: &DatabaseConnection,
    username: &str,
    email: &str,
    password: &str,
    is_staff: bool,
) -> Result<(user::Model, bool), DomainError> {
    if let Some(existing) = user::Entity::find()
        .filter(user::Column::Username.eq(username))
        .one(db)
        .await?
    {
        return Ok((existing, false));
    }

    let model = user::ActiveModel {
        username: Set(username.to_owned()),
        email: Set(email.to_owned()),
        first_name: Set(String::new()),
        last_name: Set(String::new()),
        password_hash: Set(hash_password(password)?),
        is_active: Set(true),
        is_staff: Set(is_staff),
        is_superuser: Set(is_staff),
        date_joined: Set(Utc::now()),
        last_login: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok((model, true))
}

pub async fn seed_demo_data(db: &DatabaseConnection) -> Result<SeedReport, DomainError> {
    let mut report = SeedReport::default();
    let mut rng = StdRng::seed_from_u64(42);
    let now = Utc::now();

    // 1. Staff account
    let (_, created) = get_or_create_user(db, "admin", "admin@example.com", "admin123", true).await?;
    if created {
        report.users += 1;
    }

    // 2. Categories
    for (name, slug, description) in CATEGORIES {
        let exists = category::Entity::find()
            .filter(category::Column::Name.eq(*name))
            .count(db)
            .await?
            > 0;
        if !exists {
            category::ActiveModel {
                name: Set(name.to_string()),
                slug: Set(slug.to_string()),
                description: Set(description.to_string()),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?;
            report.categories += 1;
        }
    }

    // 3. Publishers
    for (name, city, country, website) in PUBLISHERS {
        let exists = publisher::Entity::find()
            .filter(publisher::Column::Name.eq(*name))
            .count(db)
            .await?
            > 0;
        if !exists {
            publisher::ActiveModel {
                name: Set(name.to_string()),
                address: Set(String::new()),
                city: Set(city.to_string()),
                country: Set(country.to_string()),
                website: Set(website.to_string()),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?;
            report.publishers += 1;
        }
    }

    let publishers = publisher::Entity::find()
        .order_by_asc(publisher::Column::Id)
        .all(db)
        .await?;
    let categories = category::Entity::find().all(db).await?;

    // 4. Authors and books
    let statuses = [
        BookStatus::Available,
        BookStatus::Available,
        BookStatus::OutOfStock,
    ];
    let mut created_books = Vec::new();

    for seed in BOOKS {
        let (first, last) = split_name(seed.author);

        let author = match author::Entity::find()
            .filter(author::Column::FirstName.eq(first.as_str()))
            .filter(author::Column::LastName.eq(last.as_str()))
            .one(db)
            .await?
        {
            Some(existing) => existing,
            None => {
                report.authors += 1;
                author::ActiveModel {
                    email: Set(format!("{}.{}@example.com", first, last)
                        .to_lowercase()
                        .replace(' ', "")),
                    first_name: Set(first.clone()),
                    last_name: Set(last.clone()),
                    birth_date: Set(NaiveDate::from_ymd_opt(1970, 1, 1)),
                    biography: Set(String::new()),
                    website: Set(String::new()),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(db)
                .await?
            }
        };

        let exists = book::Entity::find()
            .filter(book::Column::Isbn.eq(seed.isbn))
            .count(db)
            .await?
            > 0;
        if exists {
            continue;
        }

        let publisher_id = publishers.choose(&mut rng).map(|p| p.id);
        let status = statuses.choose(&mut rng).copied().unwrap_or_default();
        let headline = seed.title.split(':').next().unwrap_or(seed.title);

        let txn = db.begin().await?;
        let model = book::ActiveModel {
            title: Set(seed.title.to_string()),
            subtitle: Set(String::new()),
            isbn: Set(seed.isbn.to_string()),
            author_id: Set(author.id),
            publisher_id: Set(publisher_id),
            owner_id: Set(None),
            publication_date: Set(seed_date(seed.published)?),
            pages: Set(seed.pages),
            price: Set(Decimal::new(seed.price_cents, 2)),
            description: Set(format!("Practical guide to {}.", headline)),
            cover_image: Set(None),
            status: Set(status),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let wanted = categories_for_title(seed.title);
        for category in categories.iter().filter(|c| wanted.contains(&c.name.as_str())) {
            book_category::ActiveModel {
                book_id: Set(model.id),
                category_id: Set(category.id),
            }
            .insert(&txn)
            .await?;
        }
        txn.commit().await?;

        report.books += 1;
        created_books.push(model);
    }

    // 5. Reviewers
    let existing_users = user::Entity::find().count(db).await? as usize;
    for i in existing_users..MIN_REVIEWERS {
        let username = format!("user{}", i);
        let (_, created) = get_or_create_user(
            db,
            &username,
            &format!("{}@example.com", username),
            "user123",
            false,
        )
        .await?;
        if created {
            report.users += 1;
        }
    }
    let users = user::Entity::find()
        .order_by_asc(user::Column::Id)
        .all(db)
        .await?;

    // 6. One to three reviews per new book, each from a different user
    for book in &created_books {
        let wanted = rng.gen_range(1..=3usize);
        let mut reviewers: Vec<&user::Model> = users.iter().collect();
        reviewers.shuffle(&mut rng);

        for reviewer in reviewers.into_iter().take(wanted) {
            let already = review::Entity::find()
                .filter(review::Column::BookId.eq(book.id))
                .filter(review::Column::UserId.eq(reviewer.id))
                .count(db)
                .await?
                > 0;
            if already {
                continue;
            }

            review::ActiveModel {
                book_id: Set(book.id),
                user_id: Set(reviewer.id),
                rating: Set(rng.gen_range(3..=5)),
                title: Set(REVIEW_TITLES.choose(&mut rng).copied().unwrap_or_default().to_string()),
                comment: Set(REVIEW_COMMENTS.choose(&mut rng).copied().unwrap_or_default().to_string()),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?;
            report.reviews += 1;
        }
    }

    tracing::info!(
        "Seeded {} user(s), {} categorie(s), {} publisher(s), {} author(s), {} book(s), {} review(s)",
        report.users,
        report.categories,
        report.publishers,
        report.authors,
        report.books,
        report.reviews
    );
    Ok(report)
}

/// Create a staff superuser unless the username is already taken
pub async fn ensure_superuser(
    db: &DatabaseConnection,
    username: &str,
    email: &str,
    password: &str,
) -> Result<SuperuserOutcome, DomainError> {
    if username.trim().is_empty() || password.is_empty() {
        return Err(DomainError::Internal(
            "Username and password are required".to_string(),
        ));
    }

    let (_, created) = get_or_create_user(db, username, email, password, true).await?;
    if created {
        tracing::info!("Superuser '{}' created", username);
        Ok(SuperuserOutcome::Created)
    } else {
        tracing::warn!("Superuser '{}' already exists - skipping", username);
        Ok(SuperuserOutcome::AlreadyExists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::db;

    #[test]
    fn title_keywords_pick_categories() {
        assert_eq!(categories_for_title("Fluent Python"), vec!["Python"]);
        assert_eq!(
            categories_for_title("The Go Programming Language"),
            vec!["Go"]
        );
        assert_eq!(categories_for_title("Grokking Algorithms"), vec!["Algorithms"]);
        assert_eq!(
            categories_for_title("JavaScript: The Good Parts"),
            vec!["JavaScript"]
        );
        assert_eq!(categories_for_title("Clean Code"), vec!["Web Development"]);
        assert!(categories_for_title("Python for Data Analysis").contains(&"Data Science"));
    }

    #[test]
    fn author_names_split_on_first_and_last() {
        assert_eq!(
            split_name("Alan A. A. Donovan"),
            ("Alan".to_string(), "Donovan".to_string())
        );
        assert_eq!(split_name("Plato"), ("Plato".to_string(), String::new()));
    }

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let db = db::init_db("sqlite::memory:").await.unwrap();

        let first = seed_demo_data(&db).await.unwrap();
        assert_eq!(first.categories, 10);
        assert_eq!(first.publishers, 6);
        assert_eq!(first.books, BOOKS.len());
        assert!(first.reviews >= first.books);

        let second = seed_demo_data(&db).await.unwrap();
        assert_eq!(second, SeedReport::default());
    }

    #[tokio::test]
    async fn superuser_bootstrap_skips_existing() {
        let db = db::init_db("sqlite::memory:").await.unwrap();

        let outcome = ensure_superuser(&db, "root", "root@example.com", "s3cret-pass")
            .await
            .unwrap();
        assert_eq!(outcome, SuperuserOutcome::Created);

        let again = ensure_superuser(&db, "root", "root@example.com", "other")
            .await
            .unwrap();
        assert_eq!(again, SuperuserOutcome::AlreadyExists);

        assert!(ensure_superuser(&db, "", "", "x").await.is_err());
    }
}
