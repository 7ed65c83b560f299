//! Current page state read through the browser
//!
//! Incremental runs store only the current version of a page, together with state
//! the history does not carry: title, tags and attached files. The current source
//! is read from the edit area, which needs a signed-in session.

use crate::browser::{
    Browser, DriverError, ACCOUNT_MENU, ACTION_AREA, EDIT_BUTTON, EDIT_CANCEL, EDIT_TEXTAREA,
    FILES_BUTTON, FILE_LINKS, LOGIN_NAME_FIELD, LOGIN_PASSWORD_FIELD, LOGIN_SUBMIT, LOGIN_URL,
    PAGE_TAGS, PAGE_TITLE,
};
use crate::Result;
use std::time::Duration;
use url::Url;

/// A file attached to the current page, not yet downloaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub name: String,
    pub url: String,
}

/// Signs in to the wiki
pub async fn login(
    browser: &mut dyn Browser,
    user: &str,
    password: &str,
    wait: Duration,
) -> Result<()> {
    browser.navigate(LOGIN_URL).await?;

    let name = browser.wait_until_present(LOGIN_NAME_FIELD, wait).await?;
    browser.type_text(&name, user).await?;
    let secret = browser.find_element(LOGIN_PASSWORD_FIELD).await?;
    browser.type_text(&secret, password).await?;
    let submit = browser.find_element(LOGIN_SUBMIT).await?;
    browser.click(&submit).await?;

    browser.wait_until_present(ACCOUNT_MENU, wait).await?;
    tracing::info!("Signed in as {}", user);
    Ok(())
}

pub async fn read_title(browser: &mut dyn Browser) -> Result<String> {
    let title = browser.find_element(PAGE_TITLE).await?;
    Ok(browser.read_text(&title).await?.trim().to_string())
}

/// Tags of the loaded page; pages without tags yield an empty list
pub async fn read_tags(browser: &mut dyn Browser) -> Result<Vec<String>> {
    let mut tags = Vec::new();
    for link in browser.find_elements(PAGE_TAGS).await? {
        let tag = browser.read_text(&link).await?.trim().to_string();
        if !tag.is_empty() {
            tags.push(tag);
        }
    }
    Ok(tags)
}

/// Reads the current wiki source through the edit area
///
/// The edit area loads slowly on large pages; its wait is retried once before
/// the page is given up. The edit is always cancelled, leaving no lock behind.
pub async fn read_current_source(
    browser: &mut dyn Browser,
    page: &str,
    wait: Duration,
) -> Result<String> {
    let edit = browser.find_element(EDIT_BUTTON).await?;
    browser.click(&edit).await?;

    let textarea = match browser.wait_until_present(EDIT_TEXTAREA, wait).await {
        Ok(textarea) => textarea,
        Err(DriverError::Timeout(what)) => {
            tracing::warn!("Edit area of {} not loaded ({}), waiting once more", page, what);
            browser.wait_until_present(EDIT_TEXTAREA, wait).await?
        }
        Err(e) => return Err(e.into()),
    };
    let source = browser.read_text(&textarea).await?;

    let cancel = browser.find_element(EDIT_CANCEL).await?;
    browser.click(&cancel).await?;

    Ok(source)
}

/// Lists the files attached to the loaded page
///
/// # Arguments
///
/// * `browser` - Session showing the page
/// * `page_url` - URL the relative download links are resolved against
/// * `wait` - Bound on the wait for the file list
pub async fn list_files(
    browser: &mut dyn Browser,
    page_url: &str,
    wait: Duration,
) -> Result<Vec<RemoteFile>> {
    let base = Url::parse(page_url)?;

    let button = browser.find_element(FILES_BUTTON).await?;
    browser.click(&button).await?;
    browser.wait_until_present(ACTION_AREA, wait).await?;

    let mut files = Vec::new();
    for link in browser.find_elements(FILE_LINKS).await? {
        let name = browser.read_text(&link).await?.trim().to_string();
        let Some(href) = browser.attribute(&link, "href").await? else {
            tracing::warn!("Attached file {:?} has no link", name);
            continue;
        };
        if name.is_empty() {
            continue;
        }
        files.push(RemoteFile {
            name,
            url: base.join(&href)?.to_string(),
        });
    }
    Ok(files)
}
