use autoredirect_core::{
    Parameters, REDIRECTION_INFORMATION_KEY, RedirectConfig, RedirectDescriptor, RedirectMethod,
};
use autoredirect_http::{Application, BookStore};
use autoredirect_http::testing::Session;

fn session() -> Session<BookStore> {
    Session::new(BookStore::new(
        RedirectConfig::builder()
            .encryption_key("book store secret")
            .debug(false)
            .default_target("/books/show/123")
            .build(),
    ))
}

fn load(session: &Session<BookStore>, token: &str) -> RedirectDescriptor {
    RedirectDescriptor::load(Some(token), session.app().config().envelope()).unwrap()
}

#[test]
fn comment_posted_before_login_is_replayed_after_login() {
    let mut s = session();

    // Visitor reads a book.
    s.get("/books/show/1", Parameters::new());
    s.assert_response(200);

    // Posting a comment needs a login.
    s.request(
        RedirectMethod::Post,
        "/comments/create",
        Parameters::new().with("summary", "hi"),
        &[("Referer", "/books/show/1")],
    );
    s.assert_redirected_to("/login/login_form");
    assert!(s.cookie("_flash").is_some());

    // The login form carries the pending comment, which itself remembers
    // the book page.
    s.request(
        RedirectMethod::Get,
        "/login/login_form",
        Parameters::new(),
        &[("Referer", "/login/login_form")],
    );
    s.assert_response(200);
    assert!(s.cookie("_flash").is_none());
    s.assert_came_from("/comments/create", Some(&Parameters::new().with("summary", "hi")));
    let value = s.input_value_within("redirection_info").unwrap();
    let info = load(&s, &value);
    let RedirectDescriptor::Operation(op) = &info else {
        panic!("expected an operation, got {info:?}");
    };
    assert_eq!(op.operation_id, "comments");
    assert_eq!(op.action_id, "create");
    assert_eq!(op.method, RedirectMethod::Post);
    let book_token = op.parameters.nested_token().unwrap().to_string();
    assert_eq!(load(&s, &book_token), RedirectDescriptor::url("/books/show/1"));

    // A wrong password shows the form again with the same information.
    s.request(
        RedirectMethod::Post,
        "/login/process_login",
        Parameters::new()
            .with("password", "wrong")
            .with(REDIRECTION_INFORMATION_KEY, value.as_str()),
        &[("Referer", "/login/login_form")],
    );
    s.assert_response(200);
    let value = s.input_value_within("redirection_info").unwrap();
    assert_eq!(load(&s, &value), info);

    // The right password replays the comment POST through a form.
    s.request(
        RedirectMethod::Post,
        "/login/process_login",
        Parameters::new()
            .with("password", "secret")
            .with(REDIRECTION_INFORMATION_KEY, value.as_str()),
        &[("Referer", "/login/login_form")],
    );
    s.assert_redirection_with_method(
        RedirectMethod::Post,
        "/comments/create",
        Some(&Parameters::new().with("summary", "hi")),
    );
    let page = s.parse_redirection_page();
    assert_eq!(page.redirection_data.as_deref(), Some(book_token.as_str()));
    assert_eq!(s.cookie("_session"), Some("logged_in"));

    // Submitting it creates the comment and goes back to the book.
    s.follow_redirection_with_method();
    s.assert_redirected_to("/books/show/1");
}

#[test]
fn hidden_field_is_forwarded_automatically() {
    let mut s = session();
    s.post("/comments/create", Parameters::new().with("summary", "hi"));
    s.get("/login/login_form", Parameters::new());
    let value = s.redirection_information_from_form();

    // No explicit token: the session forwards the one on the page.
    s.post("/login/process_login", Parameters::new().with("password", "wrong"));
    s.assert_response(200);
    assert_eq!(load(&s, &s.redirection_information_from_form()), load(&s, &value));
}
