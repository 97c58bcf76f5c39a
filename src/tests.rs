use crate::AppState;
use crate::auth::AuthService;
use crate::config::{BookFormat, Config, StorageBackend};
use crate::db::Database;
use crate::error::AppError;
use crate::formats::get_extractor;
use crate::library::{ReadingProgress, RemoteBook, User};
use crate::storage::{DocumentStore, LocalObjectStore, ObjectStore};
use crate::viewmodels::{AuthState, OperationResult, UploadState};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

const PASSWORD: &str = "secret-pass";

struct Fixture {
    dir: TempDir,
    state: AppState,
    store: Arc<dyn ObjectStore>,
}

impl Fixture {
    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write(&self, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, contents).unwrap();
        path
    }
}

fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.storage.root = dir.join("bucket");
    config.library.downloads_dir = dir.join("downloads");
    config.library.temp_dir = dir.join("tmp");
    config.auth.session_file = dir.join("session");
    config
}

fn open_state(dir: &Path, db: Database) -> (AppState, Arc<dyn ObjectStore>) {
    let config = test_config(dir);
    let store: Arc<dyn ObjectStore> =
        Arc::new(LocalObjectStore::new(&config.storage.root).unwrap());
    let state = AppState::new_with(config, db, Arc::clone(&store), false);
    (state, store)
}

async fn signed_in_fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let (state, store) = open_state(dir.path(), Database::open_memory().unwrap());
    state
        .auth
        .register("Ann", "ann@example.com", PASSWORD)
        .await
        .unwrap();
    Fixture { dir, state, store }
}

fn staged_files(fx: &Fixture) -> usize {
    std::fs::read_dir(fx.path("tmp"))
        .map(|entries| entries.count())
        .unwrap_or(0)
}

fn build_pdf(path: &Path, pages: &[&[u8]]) {
    use lopdf::content::{Content, Operation};
    use lopdf::{Document, Object, Stream, dictionary};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(text.to_vec())]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

fn build_epub(path: &Path) {
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default();

    zip.start_file("mimetype", options).unwrap();
    zip.write_all(b"application/epub+zip").unwrap();

    zip.start_file("META-INF/container.xml", options).unwrap();
    zip.write_all(
        br#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#,
    )
    .unwrap();

    zip.start_file("OEBPS/content.opf", options).unwrap();
    zip.write_all(
        br#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
  <manifest>
    <item id="c2" href="text/chapter2.xhtml" media-type="application/xhtml+xml"/>
    <item id="c1" href="text/chapter1.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine>
    <itemref idref="c1"/>
    <itemref idref="c2"/>
  </spine>
</package>"#,
    )
    .unwrap();

    zip.start_file("OEBPS/text/chapter1.xhtml", options).unwrap();
    zip.write_all(
        br#"<?xml version="1.0"?>
<html xmlns="http://www.w3.org/1999/xhtml">
  <head><title>Ignored title</title><style>p { color: red }</style></head>
  <body><h1>Chapter One</h1><p>It was a dark night.</p></body>
</html>"#,
    )
    .unwrap();

    zip.start_file("OEBPS/text/chapter2.xhtml", options).unwrap();
    zip.write_all(
        br#"<?xml version="1.0"?>
<html xmlns="http://www.w3.org/1999/xhtml">
  <body><h1>Chapter Two</h1><p>Morning came.</p></body>
</html>"#,
    )
    .unwrap();

    zip.finish().unwrap();
}

fn has_forbidden_control(text: &str) -> bool {
    text.chars()
        .any(|c| c.is_ascii_control() && !matches!(c, '\t' | '\n' | '\r') && c != '\u{7f}')
}

// Repository

#[tokio::test]
async fn test_upload_rejects_unknown_type() {
    let fx = signed_in_fixture().await;
    let source = fx.write("notes.docx", "not a book");

    let result = fx.state.books.upload_book(&source, "Notes", "Ann").await;
    assert!(matches!(result, Err(AppError::InvalidFormat(_))));
    assert!(fx.state.books.load_all_books().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_stores_book() {
    let fx = signed_in_fixture().await;
    let user_id = fx.state.auth.current().require_id().unwrap();
    let source = fx.write("dune.txt", "A beginning is the time");

    let book = fx
        .state
        .books
        .upload_book(&source, "Dune", "Frank Herbert")
        .await
        .unwrap();

    assert_eq!(book.format, BookFormat::Txt);
    assert_eq!(book.user_id, user_id);
    assert!(!book.is_downloaded());

    let key = format!("books/{}/{}.plain", user_id, book.id);
    assert!(fx.store.get_bytes(&key).await.unwrap().is_some());
    assert_eq!(book.file_url, fx.store.public_url(&key));
    assert_eq!(staged_files(&fx), 0);

    let books = fx.state.books.load_all_books().await.unwrap();
    assert_eq!(books, vec![book.clone()]);

    let docs = DocumentStore::new(Arc::clone(&fx.store));
    let doc: Option<RemoteBook> = docs
        .get(&format!("books/{}", user_id), &book.id)
        .await
        .unwrap();
    assert_eq!(doc.unwrap().title, "Dune");
}

#[tokio::test]
async fn test_upload_requires_sign_in() {
    let fx = signed_in_fixture().await;
    fx.state.auth.logout().await.unwrap();
    let source = fx.write("dune.txt", "text");

    let result = fx.state.books.upload_book(&source, "Dune", "Frank Herbert").await;
    assert!(matches!(result, Err(AppError::Unauthorized(_))));
}

#[tokio::test]
async fn test_failed_upload_cleans_up() {
    let fx = signed_in_fixture().await;
    let user_id = fx.state.auth.current().require_id().unwrap();
    let source = fx.write("dune.txt", "text");

    // A plain file where the user's directory belongs makes the transfer fail.
    std::fs::create_dir_all(fx.path("bucket/books")).unwrap();
    std::fs::write(fx.path("bucket/books").join(&user_id), "blocker").unwrap();

    let err = fx
        .state
        .books
        .upload_book(&source, "Dune", "Frank Herbert")
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("Upload failed"));
    assert_eq!(staged_files(&fx), 0);
    assert!(fx.state.books.load_all_books().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_canceled_upload_leaves_nothing_behind() {
    let fx = signed_in_fixture().await;
    let user_id = fx.state.auth.current().require_id().unwrap();
    let source = fx.write("big.txt", vec![b'x'; 32 * 1024 * 1024]);

    let pending = fx
        .state
        .books
        .start_upload(&source, "Big", "Anon")
        .await
        .unwrap();
    let mut progress = pending.progress();
    progress.changed().await.unwrap();
    pending.cancel();

    let err = pending.finish().await.unwrap_err();
    assert_eq!(err.to_string(), "Upload canceled");
    assert_eq!(staged_files(&fx), 0);
    assert!(fx.state.books.load_all_books().await.unwrap().is_empty());

    let user_dir = fx.path("bucket/books").join(&user_id);
    let leftovers = std::fs::read_dir(&user_dir)
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn test_unreadable_source_is_not_staged() {
    let fx = signed_in_fixture().await;
    let source = fx.path("folder.txt");
    std::fs::create_dir(&source).unwrap();

    let result = fx.state.books.upload_book(&source, "Folder", "Anon").await;
    assert!(matches!(result, Err(AppError::Io(_))));
    assert_eq!(staged_files(&fx), 0);
}

#[tokio::test]
async fn test_download_then_read() {
    let fx = signed_in_fixture().await;
    let source = fx.write("tale.txt", "\u{feff}Once upon a time");
    let book = fx.state.books.upload_book(&source, "Tale", "Anon").await.unwrap();

    let downloaded = fx.state.books.download_book(&book).await.unwrap();
    assert!(downloaded.is_downloaded());
    let local = downloaded.local_file().unwrap();
    assert!(local.exists());
    assert!(local.starts_with(std::path::absolute(fx.path("downloads")).unwrap()));

    let content = fx.state.books.get_book_content(&downloaded).await.unwrap();
    assert_eq!(content, "Once upon a time");

    // The stored row carries the local path.
    let reloaded = fx.state.books.load_book_by_id(&book.id).await.unwrap();
    assert_eq!(reloaded.local_path, downloaded.local_path);
}

#[tokio::test]
async fn test_download_missing_object_leaves_book_untouched() {
    let fx = signed_in_fixture().await;
    let source = fx.write("tale.txt", "text");
    let book = fx.state.books.upload_book(&source, "Tale", "Anon").await.unwrap();

    let key = book.remote_key();
    std::fs::remove_file(fx.path("bucket").join(key)).unwrap();

    assert!(fx.state.books.download_book(&book).await.is_err());
    let reloaded = fx.state.books.load_book_by_id(&book.id).await.unwrap();
    assert!(!reloaded.is_downloaded());
}

#[tokio::test]
async fn test_content_requires_local_file() {
    let fx = signed_in_fixture().await;
    let source = fx.write("tale.txt", "text");
    let book = fx.state.books.upload_book(&source, "Tale", "Anon").await.unwrap();

    let err = fx.state.books.get_book_content(&book).await.unwrap_err();
    assert_eq!(err.to_string(), "Book is not downloaded locally");

    let downloaded = fx.state.books.download_book(&book).await.unwrap();
    std::fs::remove_file(downloaded.local_file().unwrap()).unwrap();
    let err = fx.state.books.get_book_content(&downloaded).await.unwrap_err();
    assert_eq!(err.to_string(), "Local book file not found");
}

#[tokio::test]
async fn test_delete_removes_book() {
    let fx = signed_in_fixture().await;
    let source = fx.write("tale.txt", "text");
    let keep_source = fx.write("keep.txt", "other");

    let book = fx.state.books.upload_book(&source, "Tale", "Anon").await.unwrap();
    let kept = fx.state.books.upload_book(&keep_source, "Keep", "Anon").await.unwrap();
    let downloaded = fx.state.books.download_book(&book).await.unwrap();

    let mut progress = ReadingProgress::new(&book.id);
    progress.progress = 0.5;
    fx.state.books.save_reading_progress(&progress).await.unwrap();

    fx.state.books.delete_book(&downloaded).await.unwrap();

    let books = fx.state.books.load_all_books().await.unwrap();
    assert_eq!(books, vec![kept]);
    assert!(!downloaded.local_file().unwrap().exists());
    assert_eq!(
        fx.state.books.get_reading_progress(&book.id).await.unwrap(),
        ReadingProgress::new(&book.id)
    );

    // Remote copy is kept.
    assert!(fx.store.get_bytes(&book.remote_key()).await.unwrap().is_some());
}

#[tokio::test]
async fn test_delete_without_local_file() {
    let fx = signed_in_fixture().await;
    let source = fx.write("tale.txt", "text");
    let book = fx.state.books.upload_book(&source, "Tale", "Anon").await.unwrap();

    tokio_test::assert_ok!(fx.state.books.delete_book(&book).await);
    assert!(fx.state.books.load_all_books().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_is_scoped_to_owner() {
    let fx = signed_in_fixture().await;
    let source = fx.write("tale.txt", "text");
    let book = fx.state.books.upload_book(&source, "Tale", "Anon").await.unwrap();

    fx.state.auth.logout().await.unwrap();
    fx.state
        .auth
        .register("Bob", "bob@example.com", PASSWORD)
        .await
        .unwrap();
    let err = fx.state.books.delete_book(&book).await.unwrap_err();
    assert_eq!(err.to_string(), "Failed to load book");

    fx.state.auth.logout().await.unwrap();
    fx.state.auth.login("ann@example.com", PASSWORD).await.unwrap();
    assert_eq!(fx.state.books.load_book_by_id(&book.id).await.unwrap(), book);
}

#[tokio::test]
async fn test_load_book_by_id_unknown() {
    let fx = signed_in_fixture().await;
    let err = fx.state.books.load_book_by_id("missing").await.unwrap_err();
    assert_eq!(err.to_string(), "Failed to load book");
}

#[tokio::test]
async fn test_reading_progress_round_trip() {
    let fx = signed_in_fixture().await;

    let fresh = fx.state.books.get_reading_progress("b1").await.unwrap();
    assert_eq!(fresh, ReadingProgress::new("b1"));

    let progress = ReadingProgress {
        book_id: "b1".to_string(),
        progress: 0.37,
        current_page: 42,
        total_pages: 113,
    };
    fx.state.books.save_reading_progress(&progress).await.unwrap();
    assert_eq!(fx.state.books.get_reading_progress("b1").await.unwrap(), progress);

    let later = ReadingProgress {
        progress: 1.0,
        current_page: 113,
        ..progress
    };
    fx.state.books.save_reading_progress(&later).await.unwrap();
    assert_eq!(fx.state.books.get_reading_progress("b1").await.unwrap(), later);
}

#[tokio::test]
async fn test_reading_progress_out_of_range() {
    let fx = signed_in_fixture().await;
    let mut progress = ReadingProgress::new("b1");
    progress.progress = 1.5;

    let result = fx.state.books.save_reading_progress(&progress).await;
    assert!(matches!(result, Err(AppError::InvalidFormat(_))));
}

#[tokio::test]
async fn test_search_books() {
    let fx = signed_in_fixture().await;
    let a = fx.write("a.txt", "a");
    let b = fx.write("b.txt", "b");
    fx.state.books.upload_book(&a, "Dune", "Frank Herbert").await.unwrap();
    fx.state.books.upload_book(&b, "Emma", "Jane Austen").await.unwrap();

    let by_title = fx.state.books.search_book("dUN").await.unwrap();
    assert_eq!(by_title.len(), 1);
    assert_eq!(by_title[0].title, "Dune");

    let by_author = fx.state.books.search_book("austen").await.unwrap();
    assert_eq!(by_author.len(), 1);
    assert_eq!(by_author[0].title, "Emma");

    let none = fx.state.books.search_book("tolstoy").await.unwrap();
    assert!(none.is_empty());

    // Wildcard characters are matched literally.
    assert!(fx.state.books.search_book("%").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_search_folds_non_ascii_case() {
    let fx = signed_in_fixture().await;
    let source = fx.write("dune.txt", "text");
    fx.state.books.upload_book(&source, "Дюна", "Фрэнк Герберт").await.unwrap();

    let by_title = fx.state.books.search_book("дюна").await.unwrap();
    assert_eq!(by_title.len(), 1);
    assert_eq!(by_title[0].title, "Дюна");
    assert_eq!(fx.state.books.search_book("ГЕРБ").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_search_is_scoped_to_user() {
    let fx = signed_in_fixture().await;
    let a = fx.write("a.txt", "a");
    fx.state.books.upload_book(&a, "Dune", "Frank Herbert").await.unwrap();

    fx.state.auth.logout().await.unwrap();
    fx.state
        .auth
        .register("Bob", "bob@example.com", PASSWORD)
        .await
        .unwrap();

    assert!(fx.state.books.search_book("dune").await.unwrap().is_empty());
    assert!(fx.state.books.load_all_books().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_sync_remote_books() {
    let fx = signed_in_fixture().await;
    let source = fx.write("tale.txt", "text");
    let book = fx.state.books.upload_book(&source, "Tale", "Anon").await.unwrap();

    // A row removed locally comes back from its metadata document.
    fx.state.books.delete_book(&book).await.unwrap();
    assert_eq!(fx.state.books.sync_remote_books().await.unwrap(), 1);

    let restored = fx.state.books.load_book_by_id(&book.id).await.unwrap();
    assert_eq!(restored, book);

    assert_eq!(fx.state.books.sync_remote_books().await.unwrap(), 0);
}

#[tokio::test]
async fn test_sync_keeps_downloaded_rows() {
    let fx = signed_in_fixture().await;
    let source = fx.write("tale.txt", "text");
    let book = fx.state.books.upload_book(&source, "Tale", "Anon").await.unwrap();
    let downloaded = fx.state.books.download_book(&book).await.unwrap();

    assert_eq!(fx.state.books.sync_remote_books().await.unwrap(), 0);
    let reloaded = fx.state.books.load_book_by_id(&book.id).await.unwrap();
    assert_eq!(reloaded.local_path, downloaded.local_path);
}

// Content extraction

#[tokio::test]
async fn test_pdf_content_is_clean() {
    let fx = signed_in_fixture().await;
    let source = fx.path("story.pdf");
    let pages: [&[u8]; 4] = [b"Hello\x01 reader", b"", b"", b"\x07Second\x0b page\x1f"];
    build_pdf(&source, &pages);

    let book = fx.state.books.upload_book(&source, "Story", "Anon").await.unwrap();
    assert_eq!(book.format, BookFormat::Pdf);
    let downloaded = fx.state.books.download_book(&book).await.unwrap();

    let text = fx.state.books.get_book_content(&downloaded).await.unwrap();
    assert!(text.contains("Hello"));
    assert!(!text.contains("\n\n\n"));
    assert!(!has_forbidden_control(&text));
    assert_eq!(text, text.trim());
}

#[test]
fn test_epub_text_in_spine_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("book.epub");
    build_epub(&path);

    let text = get_extractor(BookFormat::Epub).extract_text(&path).unwrap();
    let one = text.find("Chapter One").unwrap();
    let two = text.find("Chapter Two").unwrap();
    assert!(one < two);
    assert!(text.contains("It was a dark night."));
    assert!(!text.contains("color: red"));
    assert!(!text.contains("Ignored title"));
    assert!(!text.contains("\n\n\n"));
}

#[test]
fn test_epub_rejects_non_zip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("book.epub");
    std::fs::write(&path, "plain text").unwrap();

    assert!(get_extractor(BookFormat::Epub).extract_text(&path).is_err());
}

// Auth

#[tokio::test]
async fn test_register_and_login() {
    let fx = signed_in_fixture().await;
    let user = fx.state.auth.current_user().await.unwrap().unwrap();
    assert_eq!(user.name, "Ann");
    assert_eq!(user.email, "ann@example.com");

    fx.state.auth.logout().await.unwrap();
    assert!(fx.state.auth.current_user().await.unwrap().is_none());

    let err = fx.state.auth.login("ann@example.com", "wrong-pass").await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));

    let again = fx.state.auth.login("ANN@example.com", PASSWORD).await.unwrap();
    assert_eq!(again.id, user.id);
}

#[tokio::test]
async fn test_register_validation() {
    let fx = signed_in_fixture().await;

    let dup = fx.state.auth.register("Ann", "ann@example.com", PASSWORD).await;
    assert!(matches!(dup, Err(AppError::InvalidFormat(_))));

    let short = fx.state.auth.register("Cy", "cy@example.com", "12345").await;
    assert!(matches!(short, Err(AppError::InvalidFormat(_))));

    let bad_email = fx.state.auth.register("Cy", "cy.example.com", PASSWORD).await;
    assert!(matches!(bad_email, Err(AppError::InvalidFormat(_))));
}

#[tokio::test]
async fn test_session_file_restores_user() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_memory().unwrap();
    let session_file = dir.path().join("state/session");

    let first = AuthService::new(db.clone(), 30, Some(session_file.clone()));
    let user = first.register("Ann", "ann@example.com", PASSWORD).await.unwrap();
    assert!(session_file.exists());

    let second = AuthService::new(db.clone(), 30, Some(session_file.clone()));
    assert_eq!(second.current_user().await.unwrap(), Some(user));

    second.logout().await.unwrap();
    assert!(!session_file.exists());

    let third = AuthService::new(db, 30, Some(session_file));
    assert!(third.current_user().await.unwrap().is_none());
}

#[tokio::test]
async fn test_expired_session_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_memory().unwrap();
    let session_file = dir.path().join("session");

    let auth = AuthService::new(db.clone(), 0, Some(session_file.clone()));
    auth.register("Ann", "ann@example.com", PASSWORD).await.unwrap();

    // Zero-day sessions expire at creation time; wait past the second.
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

    let restored = AuthService::new(db, 0, Some(session_file));
    assert!(restored.current_user().await.unwrap().is_none());
}

// Profile

#[tokio::test]
async fn test_update_user_profile() {
    let fx = signed_in_fixture().await;
    let mut user = fx.state.users.get_user().await.unwrap();

    user.name = "Anna".to_string();
    user.phone_number = Some("+1 555 0100".to_string());
    fx.state.users.update_user(&user).await.unwrap();

    assert_eq!(fx.state.users.get_user().await.unwrap(), user);
    assert_eq!(fx.state.auth.current().get(), Some(user.clone()));

    let docs = DocumentStore::new(Arc::clone(&fx.store));
    let doc: serde_json::Value = docs.get("users", &user.id).await.unwrap().unwrap();
    assert_eq!(doc["name"], "Anna");
    assert_eq!(doc["phoneNumber"], "+1 555 0100");
}

#[tokio::test]
async fn test_update_other_user_is_rejected() {
    let fx = signed_in_fixture().await;
    let other = User {
        id: "someone-else".to_string(),
        name: "Eve".to_string(),
        email: "eve@example.com".to_string(),
        avatar_image_url: None,
        phone_number: None,
    };

    let result = fx.state.users.update_user(&other).await;
    assert!(matches!(result, Err(AppError::Unauthorized(_))));
}

#[tokio::test]
async fn test_update_avatar_image() {
    let fx = signed_in_fixture().await;
    let user_id = fx.state.auth.current().require_id().unwrap();
    let image = fx.write("me.png", [0x89, b'P', b'N', b'G']);

    let url = fx.state.users.update_avatar_image(&image).await.unwrap();
    assert_eq!(url, fx.store.public_url(&format!("avatars/{}", user_id)));

    let user = fx.state.users.get_user().await.unwrap();
    assert_eq!(user.avatar_image_url.as_deref(), Some(url.as_str()));
}

#[tokio::test]
async fn test_get_user_signed_out() {
    let fx = signed_in_fixture().await;
    fx.state.auth.logout().await.unwrap();

    let err = fx.state.users.get_user().await.unwrap_err();
    assert_eq!(err.to_string(), "User not found");
}

// View-state holders

#[tokio::test]
async fn test_books_view_model_upload_and_search() {
    let fx = signed_in_fixture().await;
    let vm = fx.state.books_view_model();
    let source = fx.write("dune.txt", "A beginning is the time");

    vm.upload_book(&source, "Dune", "Frank Herbert").await;
    let uploaded = match vm.upload_state().borrow().clone() {
        UploadState::Success(book) => book,
        other => panic!("unexpected upload state: {:?}", other),
    };
    assert_eq!(
        vm.books_state().borrow().success(),
        Some(&vec![uploaded.clone()])
    );
    assert!(!*vm.is_loading().borrow());

    vm.search_books("nothing").await;
    assert_eq!(*vm.search_query().borrow(), "nothing");
    assert_eq!(vm.books_state().borrow().success(), Some(&vec![]));

    vm.search_books("   ").await;
    assert_eq!(vm.books_state().borrow().success().map(Vec::len), Some(1));

    vm.reset_upload_state();
    assert_eq!(*vm.upload_state().borrow(), UploadState::Idle);
}

#[tokio::test]
async fn test_books_view_model_upload_error() {
    let fx = signed_in_fixture().await;
    let vm = fx.state.books_view_model();
    let source = fx.write("cover.png", [0u8; 4]);

    vm.upload_book(&source, "Cover", "Nobody").await;
    assert!(matches!(*vm.upload_state().borrow(), UploadState::Error(_)));
}

#[tokio::test]
async fn test_books_view_model_download_and_delete() {
    let fx = signed_in_fixture().await;
    let vm = fx.state.books_view_model();
    let source = fx.write("tale.txt", "text");
    let book = fx.state.books.upload_book(&source, "Tale", "Anon").await.unwrap();

    let downloaded = match vm.download_book(&book).await {
        OperationResult::Success(book) => book,
        other => panic!("unexpected download result: {:?}", other),
    };
    let listed = vm.books_state().borrow().success().cloned().unwrap();
    assert!(listed[0].is_downloaded());

    assert_eq!(vm.delete_book(&downloaded).await, OperationResult::Success(()));
    assert_eq!(vm.books_state().borrow().success(), Some(&vec![]));
}

#[tokio::test]
async fn test_reading_view_model() {
    let fx = signed_in_fixture().await;
    let vm = fx.state.reading_view_model();
    let source = fx.write("tale.txt", "Once upon a time");
    let book = fx.state.books.upload_book(&source, "Tale", "Anon").await.unwrap();

    // Not downloaded: content fails, progress falls back to zero.
    vm.load_book_by_id(&book.id).await;
    assert_eq!(
        vm.book_content().borrow().clone(),
        Some(OperationResult::Error("Book is not downloaded locally".into()))
    );
    assert_eq!(
        vm.reading_progress().borrow().clone(),
        Some(ReadingProgress::new(&book.id))
    );

    fx.state.books.download_book(&book).await.unwrap();
    vm.load_book_by_id(&book.id).await;
    assert_eq!(
        vm.book_content().borrow().clone(),
        Some(OperationResult::Success("Once upon a time".into()))
    );

    assert_eq!(vm.save_progress(0.25, 3, 12).await, OperationResult::Success(()));
    assert_eq!(vm.update_progress(0.5).await, OperationResult::Success(()));

    // A rejected save keeps the last stored position.
    assert!(matches!(
        vm.update_progress(1.5).await,
        OperationResult::Error(_)
    ));
    assert_eq!(vm.reading_progress().borrow().as_ref().unwrap().progress, 0.5);

    let saved = fx.state.books.get_reading_progress(&book.id).await.unwrap();
    assert_eq!(saved.progress, 0.5);
    assert_eq!(saved.current_page, 3);
    assert_eq!(saved.total_pages, 12);
}

#[tokio::test]
async fn test_reading_view_model_unknown_book() {
    let fx = signed_in_fixture().await;
    let vm = fx.state.reading_view_model();

    vm.load_book_by_id("missing").await;
    assert_eq!(
        vm.book_content().borrow().clone(),
        Some(OperationResult::Error("Failed to load book".into()))
    );
    assert!(!*vm.is_loading().borrow());
    assert!(matches!(
        vm.save_progress(0.1, 0, 0).await,
        OperationResult::Error(_)
    ));
}

#[tokio::test]
async fn test_auth_view_model() {
    let dir = tempfile::tempdir().unwrap();
    let (state, _store) = open_state(dir.path(), Database::open_memory().unwrap());
    let vm = state.auth_view_model();
    assert_eq!(*vm.auth_state().borrow(), AuthState::Loading);

    vm.check_current_user().await;
    assert_eq!(*vm.auth_state().borrow(), AuthState::Unauthenticated);

    vm.register("Ann", "ann@example.com", "short").await;
    assert!(matches!(*vm.auth_state().borrow(), AuthState::Error(_)));
    vm.clear_error();
    assert_eq!(*vm.auth_state().borrow(), AuthState::Unauthenticated);

    vm.register("Ann", "ann@example.com", PASSWORD).await;
    let user = vm.current_user().borrow().clone().unwrap();
    assert_eq!(*vm.auth_state().borrow(), AuthState::Authenticated(user));

    vm.logout().await;
    assert_eq!(*vm.auth_state().borrow(), AuthState::Unauthenticated);
    assert!(vm.current_user().borrow().is_none());

    vm.login("ann@example.com", PASSWORD).await;
    assert!(matches!(*vm.auth_state().borrow(), AuthState::Authenticated(_)));
}

#[tokio::test]
async fn test_profile_view_model() {
    let fx = signed_in_fixture().await;
    let vm = fx.state.profile_view_model();

    vm.load_user().await;
    let mut user = vm.user_state().borrow().clone().unwrap().success().cloned().unwrap();

    vm.set_editing(true);
    user.name = "Anna".to_string();
    vm.update_user(&user).await;
    assert!(!*vm.is_editing().borrow());
    assert_eq!(
        vm.user_state().borrow().clone(),
        Some(OperationResult::Success(user))
    );

    let image = fx.write("me.jpg", [0xff, 0xd8]);
    vm.update_avatar(&image).await;
    let reloaded = vm.user_state().borrow().clone().unwrap();
    assert!(reloaded.success().unwrap().avatar_image_url.is_some());

    vm.clear_state();
    assert!(vm.user_state().borrow().is_none());
}

// Config

#[test]
fn test_config_parsing() {
    let config: Config = toml::from_str(
        r#"
[database]
path = "/var/lib/bookly/bookly.db"

[storage]
backend = "http"
endpoint = "https://storage.example.net"
bucket = "books"

[auth]
session_days = 7
"#,
    )
    .unwrap();

    assert_eq!(config.database.path, PathBuf::from("/var/lib/bookly/bookly.db"));
    assert_eq!(config.storage.backend, StorageBackend::Http);
    assert_eq!(config.storage.endpoint.as_deref(), Some("https://storage.example.net"));
    assert_eq!(config.storage.bucket, "books");
    assert_eq!(config.auth.session_days, 7);
    assert_eq!(config.library.downloads_dir, PathBuf::from("data/downloads"));
}

#[test]
fn test_default_config_parses() {
    let config: Config = toml::from_str(&Config::generate_default()).unwrap();
    assert_eq!(config.storage.backend, StorageBackend::Local);
    assert_eq!(config.storage.root, PathBuf::from("data/bucket"));
}

#[test]
fn test_format_from_path() {
    let mime = |name: &str| BookFormat::mime_for_path(Path::new(name));

    assert_eq!(mime("a.TXT").and_then(BookFormat::from_mime), Some(BookFormat::Txt));
    assert_eq!(mime("a.epub").and_then(BookFormat::from_mime), Some(BookFormat::Epub));
    assert_eq!(mime("a.pdf").and_then(BookFormat::from_mime), Some(BookFormat::Pdf));
    assert_eq!(mime("a.png").and_then(BookFormat::from_mime), None);
    assert_eq!(BookFormat::from_mime("text/plain; charset=utf-8"), Some(BookFormat::Txt));
}
