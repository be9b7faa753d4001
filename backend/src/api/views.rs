// Server-rendered pages: `/` picks the sign-in page or the bookmark page from
// the session, and plain form posts cover add/delete without JavaScript.
use axum::{
  extract::{Path, Query, State},
  http::HeaderMap,
  response::{Html, IntoResponse, Redirect, Response},
  Form,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use std::fmt::Write as _;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::auth::helpers::current_session;
use crate::api::bookmarks::validate::{self, InputError};
use crate::db::{Bookmark, User};
use crate::AppState;

const APP_TITLE: &str = "Smart Bookmark App";

#[derive(Debug, Deserialize)]
pub struct HomeQuery {
  error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BookmarkForm {
  #[serde(default)]
  url: String,
  #[serde(default)]
  title: String,
}

/// Outcome of a form post, carried back to `/` as `?error=<code>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormNotice {
  Invalid(InputError),
  AddFailed,
  DeleteFailed,
}

impl FormNotice {
  pub fn code(self) -> &'static str {
    match self {
      FormNotice::Invalid(err) => err.code(),
      FormNotice::AddFailed => "add_failed",
      FormNotice::DeleteFailed => "delete_failed",
    }
  }

  pub fn from_code(code: &str) -> Option<Self> {
    match code {
      "add_failed" => Some(FormNotice::AddFailed),
      "delete_failed" => Some(FormNotice::DeleteFailed),
      _ => InputError::from_code(code).map(FormNotice::Invalid),
    }
  }

  pub fn message(self) -> &'static str {
    match self {
      FormNotice::Invalid(err) => err.message(),
      FormNotice::AddFailed => "Failed to add bookmark",
      FormNotice::DeleteFailed => "Failed to delete bookmark",
    }
  }

  fn redirect(self) -> Redirect {
    Redirect::to(&format!("/?error={}", self.code()))
  }
}

/// Escape text for HTML element content and quoted attribute values
pub fn escape_html(raw: &str) -> String {
  let mut out = String::with_capacity(raw.len());
  for c in raw.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#39;"),
      _ => out.push(c),
    }
  }
  out
}

/// "1 bookmark saved" / "3 bookmarks saved"
pub fn count_label(count: usize) -> String {
  format!(
    "{} bookmark{} saved",
    count,
    if count == 1 { "" } else { "s" }
  )
}

fn page(body: &str, script: &str) -> String {
  format!(
    r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<meta name="description" content="Manage your bookmarks with real-time sync">
<title>{APP_TITLE}</title>
<style>{STYLE}</style>
</head>
<body>
<main>
{body}
</main>
{script}
</body>
</html>
"#
  )
}

pub fn render_sign_in_page(provider: &str, error: Option<&str>) -> String {
  let banner = match error {
    Some("auth_failed") => {
      r#"<p class="error" role="alert">Authentication failed. Please try again.</p>"#
    }
    _ => "",
  };

  let body = format!(
    r#"<section class="card center">
<h1>My Bookmarks</h1>
<p class="muted">Save links and see them sync across every open session.</p>
{banner}
<a class="btn-primary" href="/auth/login">Sign in with {provider}</a>
</section>"#,
    provider = escape_html(provider),
  );

  page(&body, "")
}

fn render_item(out: &mut String, bookmark: &Bookmark) {
  let id = bookmark.id;
  let _ = write!(
    out,
    r#"<li class="bookmark-card" data-id="{id}">
<div class="grow">
<h3>{title}</h3>
<a href="{url}" target="_blank" rel="noopener noreferrer">{url}</a>
<p class="muted small">Added <time datetime="{ts}">{date} at {time}</time></p>
</div>
<form method="post" action="/bookmarks/{id}/delete">
<button class="btn-danger" type="submit" title="Delete bookmark">Delete</button>
</form>
</li>
"#,
    title = escape_html(&bookmark.title),
    url = escape_html(&bookmark.url),
    ts = bookmark.created_at.to_rfc3339(),
    date = bookmark.created_at.format("%Y-%m-%d"),
    time = bookmark.created_at.format("%H:%M:%S UTC"),
  );
}

pub fn render_bookmarks_page(user: &User, bookmarks: &[Bookmark], notice: Option<FormNotice>) -> String {
  let notice_html = notice
    .map(|n| format!(r#"<p class="error" role="alert">{}</p>"#, n.message()))
    .unwrap_or_default();

  let mut items = String::new();
  for bookmark in bookmarks {
    render_item(&mut items, bookmark);
  }

  let hidden_when_empty = if bookmarks.is_empty() { " hidden" } else { "" };
  let hidden_when_full = if bookmarks.is_empty() { "" } else { " hidden" };

  let body = format!(
    r#"<header class="card row">
<div>
<h1>My Bookmarks</h1>
<p class="muted">Logged in as {email}</p>
</div>
<form method="post" action="/auth/signout"><button class="btn-secondary" type="submit">Sign Out</button></form>
</header>
<section class="card">
<h2>Add New Bookmark</h2>
{notice_html}
<form method="post" action="/bookmarks" class="stack">
<label>Title <input type="text" name="title" placeholder="My Awesome Website" required></label>
<label>URL <input type="url" name="url" placeholder="https://example.com" required></label>
<button class="btn-primary" type="submit">Add Bookmark</button>
</form>
</section>
<section id="empty" class="card center"{hidden_when_full}>
<p class="big">No bookmarks yet!</p>
<p class="muted small">Add your first bookmark above</p>
</section>
<p id="count" class="card"{hidden_when_empty}>{count}</p>
<ul id="bookmarks">
{items}</ul>"#,
    email = escape_html(&user.email),
    count = count_label(bookmarks.len()),
  );

  page(&body, &format!("<script>{LIVE_SCRIPT}</script>"))
}

pub async fn home(
  State(state): State<Arc<AppState>>,
  jar: CookieJar,
  headers: HeaderMap,
  Query(query): Query<HomeQuery>,
) -> Response {
  let session = match current_session(&state, &jar, &headers).await {
    Ok(session) => session,
    Err(e) => {
      tracing::error!("Failed to load session for home page: {}", e);
      None
    }
  };

  let Some((user, _claims)) = session else {
    return Html(render_sign_in_page(
      &state.config.oauth.display_name(),
      query.error.as_deref(),
    ))
    .into_response();
  };

  let bookmarks = match state.db.list_bookmarks(&user.id).await {
    Ok(bookmarks) => bookmarks,
    Err(e) => {
      tracing::error!("Error fetching bookmarks for user {}: {}", user.id, e);
      Vec::new()
    }
  };

  let notice = query.error.as_deref().and_then(FormNotice::from_code);
  Html(render_bookmarks_page(&user, &bookmarks, notice)).into_response()
}

/// POST /bookmarks: add from the HTML form
pub async fn add_bookmark_form(
  State(state): State<Arc<AppState>>,
  jar: CookieJar,
  headers: HeaderMap,
  Form(form): Form<BookmarkForm>,
) -> Redirect {
  let user = match current_session(&state, &jar, &headers).await {
    Ok(Some((user, _))) => user,
    _ => return Redirect::to("/"),
  };

  let (url, title) = match validate::validate_new(&form.url, &form.title) {
    Ok(valid) => valid,
    Err(err) => return FormNotice::Invalid(err).redirect(),
  };

  match state.db.create_bookmark(&user.id, &url, &title).await {
    Ok(_) => Redirect::to("/"),
    Err(e) => {
      tracing::error!("Error adding bookmark for user {}: {}", user.id, e);
      FormNotice::AddFailed.redirect()
    }
  }
}

/// POST /bookmarks/:id/delete: delete from the HTML form
pub async fn delete_bookmark_form(
  State(state): State<Arc<AppState>>,
  jar: CookieJar,
  headers: HeaderMap,
  Path(id): Path<String>,
) -> Redirect {
  let user = match current_session(&state, &jar, &headers).await {
    Ok(Some((user, _))) => user,
    _ => return Redirect::to("/"),
  };

  let Ok(id) = Uuid::parse_str(&id) else {
    return Redirect::to("/");
  };

  match state.db.delete_bookmark(&user.id, &id).await {
    Ok(true) => Redirect::to("/"),
    Ok(false) => {
      tracing::debug!(bookmark_id = %id, "Delete of missing bookmark ignored");
      Redirect::to("/")
    }
    Err(e) => {
      tracing::error!("Error deleting bookmark {}: {}", id, e);
      FormNotice::DeleteFailed.redirect()
    }
  }
}

const STYLE: &str = r#"
body{margin:0;font-family:system-ui,sans-serif;background:linear-gradient(135deg,#eff6ff,#e0e7ff);min-height:100vh}
main{max-width:56rem;margin:0 auto;padding:2rem 1rem}
.card{background:#fff;border-radius:1rem;box-shadow:0 10px 25px rgba(0,0,0,.08);padding:1.5rem;margin-bottom:1.5rem}
.row{display:flex;justify-content:space-between;align-items:center}
.center{text-align:center}
.stack{display:flex;flex-direction:column;gap:1rem}
.stack label{display:flex;flex-direction:column;font-weight:600;gap:.5rem}
input{padding:.6rem;border:1px solid #d1d5db;border-radius:.5rem}
.muted{color:#4b5563}.small{font-size:.8rem}.big{font-size:1.25rem}
.error{color:#b91c1c;background:#fef2f2;padding:.75rem;border-radius:.5rem}
.btn-primary,.btn-secondary,.btn-danger{border:0;border-radius:.5rem;padding:.6rem 1rem;font-weight:600;color:#fff;cursor:pointer;text-decoration:none;display:inline-block}
.btn-primary{background:#2563eb}.btn-secondary{background:#4b5563}.btn-danger{background:#dc2626}
#bookmarks{list-style:none;padding:0}
.bookmark-card{display:flex;gap:1rem;background:#fff;border-radius:1rem;padding:1rem 1.5rem;margin-bottom:1rem;box-shadow:0 4px 12px rgba(0,0,0,.06)}
.bookmark-card h3{margin:0 0 .25rem}.bookmark-card a{word-break:break-all}
.grow{flex:1;min-width:0}
"#;

// Mirrors the list rules of the CLI: INSERT prepends (replacing a row with the
// same id), DELETE removes by old.id, UPDATE replaces in place.
const LIVE_SCRIPT: &str = r#"
(() => {
  const list = document.getElementById('bookmarks');
  const count = document.getElementById('count');
  const empty = document.getElementById('empty');
  const find = (id) => list.querySelector(`li[data-id="${CSS.escape(id)}"]`);
  const localize = (root) => root.querySelectorAll('time[datetime]').forEach((el) => {
    const d = new Date(el.getAttribute('datetime'));
    el.textContent = `${d.toLocaleDateString()} at ${d.toLocaleTimeString()}`;
  });
  const render = (b) => {
    const li = document.createElement('li');
    li.className = 'bookmark-card';
    li.dataset.id = b.id;
    const body = document.createElement('div');
    body.className = 'grow';
    const h3 = document.createElement('h3');
    h3.textContent = b.title;
    const a = document.createElement('a');
    a.href = b.url; a.target = '_blank'; a.rel = 'noopener noreferrer';
    a.textContent = b.url;
    const p = document.createElement('p');
    p.className = 'muted small';
    const t = document.createElement('time');
    t.setAttribute('datetime', b.created_at);
    p.append('Added ', t);
    body.append(h3, a, p);
    const form = document.createElement('form');
    form.method = 'post';
    form.action = `/bookmarks/${encodeURIComponent(b.id)}/delete`;
    const btn = document.createElement('button');
    btn.className = 'btn-danger'; btn.type = 'submit'; btn.title = 'Delete bookmark';
    btn.textContent = 'Delete';
    form.append(btn);
    li.append(body, form);
    localize(li);
    return li;
  };
  const refresh = () => {
    const n = list.children.length;
    count.textContent = `${n} bookmark${n !== 1 ? 's' : ''} saved`;
    count.hidden = n === 0;
    empty.hidden = n !== 0;
  };
  localize(list);
  const source = new EventSource('/api/v1/bookmarks/stream');
  source.addEventListener('bookmark', (event) => {
    const change = JSON.parse(event.data);
    if (change.eventType === 'INSERT' && change.new) {
      const existing = find(change.new.id);
      if (existing) existing.replaceWith(render(change.new));
      else list.prepend(render(change.new));
    } else if (change.eventType === 'DELETE' && change.old) {
      const existing = find(change.old.id);
      if (existing) existing.remove();
    } else if (change.eventType === 'UPDATE' && change.new) {
      const existing = find(change.new.id);
      if (existing) existing.replaceWith(render(change.new));
    }
    refresh();
  });
})();
"#;
