use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::sync::Once;

use serde::Serialize;

use crate::api::CanvasApi;
use crate::config::Config;
use crate::crud;
use crate::error::SyncError;
use crate::store::Store;
use crate::sync::SyncClient;

/// Opaque handle that owns a SQLite connection.
/// Swift/Kotlin hold this as an unsafe pointer and pass it back to Rust APIs.
/// All calls for one handle must come from a single thread.
pub struct SyncConnHandle {
    conn: rusqlite::Connection,
}

fn ptr_to_str<'a>(ptr: *const c_char) -> Result<&'a str, ()> {
    if ptr.is_null() {
        return Err(());
    }
    unsafe { CStr::from_ptr(ptr).to_str().map_err(|_| ()) }
}

fn to_cstring_ptr(s: &str) -> *mut c_char {
    CString::new(s).map(|cs| cs.into_raw()).unwrap_or(std::ptr::null_mut())
}

/// Run a store operation for status-code entry points.
/// 0 ok, 1 engine error, 2 bad handle.
fn with_store<F>(handle: *mut SyncConnHandle, f: F) -> c_int
where
    F: FnOnce(&Store<'_>) -> Result<(), SyncError>,
{
    let h = unsafe { handle.as_mut() };
    let Some(h) = h else { return 2 };
    let store = match Store::new(&h.conn) {
        Ok(s) => s,
        Err(_) => return 1,
    };
    match f(&store) {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

/// Run a store query and hand its result back as a JSON C string.
/// Null on any failure.
fn json_out<T, F>(handle: *mut SyncConnHandle, f: F) -> *mut c_char
where
    T: Serialize,
    F: FnOnce(&Store<'_>) -> Result<T, SyncError>,
{
    let h = unsafe { handle.as_mut() };
    let Some(h) = h else { return std::ptr::null_mut() };
    let store = match Store::new(&h.conn) {
        Ok(s) => s,
        Err(_) => return std::ptr::null_mut(),
    };
    match f(&store).and_then(|v| Ok(serde_json::to_string(&v)?)) {
        Ok(s) => to_cstring_ptr(&s),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Free a C string returned by this library.
#[unsafe(no_mangle)]
pub extern "C" fn canvas_string_free(s: *mut c_char) {
    if s.is_null() {
        return;
    }
    unsafe { let _ = CString::from_raw(s); }
}

/// Install a stderr tracing subscriber honoring RUST_LOG. Idempotent.
#[unsafe(no_mangle)]
pub extern "C" fn canvas_init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();
    });
}

/// Open a SQLite connection. Path can be file path or ":memory:".
/// Returns null on failure.
#[unsafe(no_mangle)]
pub extern "C" fn canvas_open(path: *const c_char) -> *mut SyncConnHandle {
    let path = match ptr_to_str(path) {
        Ok(s) => s,
        Err(_) => return std::ptr::null_mut(),
    };
    match rusqlite::Connection::open(path) {
        Ok(conn) => Box::into_raw(Box::new(SyncConnHandle { conn })),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Close a previously opened connection.
#[unsafe(no_mangle)]
pub extern "C" fn canvas_close(handle: *mut SyncConnHandle) {
    if handle.is_null() {
        return;
    }
    unsafe { let _ = Box::from_raw(handle); }
}

/// Create the mirrored tables. Returns 0 on success, non-zero on error.
#[unsafe(no_mangle)]
pub extern "C" fn canvas_init_schema(handle: *mut SyncConnHandle) -> c_int {
    with_store(handle, |store| store.init_schema())
}

/// Run one full sync pass against the given host and token.
/// Returns the report as a JSON C string, or null on hard failure
/// (bad handle, bad arguments, unusable base url).
#[unsafe(no_mangle)]
pub extern "C" fn canvas_sync_pass(
    handle: *mut SyncConnHandle,
    base_url: *const c_char,
    token: *const c_char,
) -> *mut c_char {
    let h = unsafe { handle.as_mut() };
    let Some(h) = h else { return std::ptr::null_mut() };
    let (base_url, token) = match (ptr_to_str(base_url), ptr_to_str(token)) {
        (Ok(u), Ok(t)) => (u, t),
        _ => return std::ptr::null_mut(),
    };
    let api = match CanvasApi::new(&Config::new(base_url, token)) {
        Ok(api) => api,
        Err(_) => return std::ptr::null_mut(),
    };
    let client = match SyncClient::new(&h.conn, api) {
        Ok(c) => c,
        Err(_) => return std::ptr::null_mut(),
    };
    match client.sync_pass().map(|r| serde_json::to_string(&r)) {
        Ok(Ok(s)) => to_cstring_ptr(&s),
        _ => std::ptr::null_mut(),
    }
}

// ---- create ---------------------------------------------------------------

/// Add a term from form input. Returns 0 ok, 1 on error (including a
/// non-integer id), 2 bad handle, 3 bad argument.
#[unsafe(no_mangle)]
pub extern "C" fn canvas_add_term(
    handle: *mut SyncConnHandle,
    id_text: *const c_char,
    name: *const c_char,
) -> c_int {
    let (id_text, name) = match (ptr_to_str(id_text), ptr_to_str(name)) {
        (Ok(a), Ok(b)) => (a, b),
        _ => return 3,
    };
    with_store(handle, |store| crud::add_term(store, id_text, name).map(|_| ()))
}

#[unsafe(no_mangle)]
pub extern "C" fn canvas_add_course(
    handle: *mut SyncConnHandle,
    term_id: i64,
    id_text: *const c_char,
    name: *const c_char,
) -> c_int {
    let (id_text, name) = match (ptr_to_str(id_text), ptr_to_str(name)) {
        (Ok(a), Ok(b)) => (a, b),
        _ => return 3,
    };
    with_store(handle, |store| {
        crud::add_course(store, term_id, id_text, name).map(|_| ())
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn canvas_add_group(
    handle: *mut SyncConnHandle,
    course_id: i64,
    id_text: *const c_char,
    name: *const c_char,
) -> c_int {
    let (id_text, name) = match (ptr_to_str(id_text), ptr_to_str(name)) {
        (Ok(a), Ok(b)) => (a, b),
        _ => return 3,
    };
    with_store(handle, |store| {
        crud::add_group(store, course_id, id_text, name).map(|_| ())
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn canvas_add_assignment(
    handle: *mut SyncConnHandle,
    group_id: i64,
    id_text: *const c_char,
    name: *const c_char,
) -> c_int {
    let (id_text, name) = match (ptr_to_str(id_text), ptr_to_str(name)) {
        (Ok(a), Ok(b)) => (a, b),
        _ => return 3,
    };
    with_store(handle, |store| {
        crud::add_assignment(store, group_id, id_text, name).map(|_| ())
    })
}

// ---- delete ---------------------------------------------------------------

/// Deletes cascade to all descendants. Returns 0 on success.
#[unsafe(no_mangle)]
pub extern "C" fn canvas_delete_term(handle: *mut SyncConnHandle, id: i64) -> c_int {
    with_store(handle, |store| crud::delete_term(store, id).map(|_| ()))
}

#[unsafe(no_mangle)]
pub extern "C" fn canvas_delete_course(handle: *mut SyncConnHandle, id: i64) -> c_int {
    with_store(handle, |store| crud::delete_course(store, id).map(|_| ()))
}

#[unsafe(no_mangle)]
pub extern "C" fn canvas_delete_group(handle: *mut SyncConnHandle, id: i64) -> c_int {
    with_store(handle, |store| crud::delete_group(store, id).map(|_| ()))
}

#[unsafe(no_mangle)]
pub extern "C" fn canvas_delete_assignment(handle: *mut SyncConnHandle, id: i64) -> c_int {
    with_store(handle, |store| crud::delete_assignment(store, id).map(|_| ()))
}

#[unsafe(no_mangle)]
pub extern "C" fn canvas_erase_terms(handle: *mut SyncConnHandle) -> c_int {
    with_store(handle, |store| crud::erase_terms(store).map(|_| ()))
}

#[unsafe(no_mangle)]
pub extern "C" fn canvas_erase_courses(handle: *mut SyncConnHandle, term_id: i64) -> c_int {
    with_store(handle, |store| crud::erase_courses(store, term_id).map(|_| ()))
}

#[unsafe(no_mangle)]
pub extern "C" fn canvas_erase_groups(handle: *mut SyncConnHandle, course_id: i64) -> c_int {
    with_store(handle, |store| crud::erase_groups(store, course_id).map(|_| ()))
}

#[unsafe(no_mangle)]
pub extern "C" fn canvas_erase_assignments(handle: *mut SyncConnHandle, group_id: i64) -> c_int {
    with_store(handle, |store| {
        crud::erase_assignments(store, group_id).map(|_| ())
    })
}

// ---- read -----------------------------------------------------------------

/// List calls return a JSON array C string in insertion order, or null on error.
#[unsafe(no_mangle)]
pub extern "C" fn canvas_list_terms(handle: *mut SyncConnHandle) -> *mut c_char {
    json_out(handle, |store| store.list_terms())
}

#[unsafe(no_mangle)]
pub extern "C" fn canvas_list_courses(handle: *mut SyncConnHandle, term_id: i64) -> *mut c_char {
    json_out(handle, |store| store.list_courses(term_id))
}

#[unsafe(no_mangle)]
pub extern "C" fn canvas_list_groups(handle: *mut SyncConnHandle, course_id: i64) -> *mut c_char {
    json_out(handle, |store| store.list_groups(course_id))
}

#[unsafe(no_mangle)]
pub extern "C" fn canvas_list_assignments(
    handle: *mut SyncConnHandle,
    group_id: i64,
) -> *mut c_char {
    json_out(handle, |store| store.list_assignments(group_id))
}

/// Row counts for the host's stats header as JSON
/// `{"terms":..,"courses":..,"groups":..,"assignments":..}`.
#[unsafe(no_mangle)]
pub extern "C" fn canvas_counts(handle: *mut SyncConnHandle) -> *mut c_char {
    json_out(handle, |store| store.counts())
}
