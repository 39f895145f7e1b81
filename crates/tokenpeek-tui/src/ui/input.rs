//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes.

use std::time::Instant;

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};
use tokenpeek_core::Route;

use crate::app::{App, AppState, LoginFocus, TokenFocus};

/// Handle keyboard input. Returns true if the app should quit.
pub fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    // A notice blocks everything else until dismissed
    if matches!(app.state, AppState::ShowingNotice) {
        if matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ')) {
            app.dismiss_notice();
        }
        return Ok(false);
    }

    match app.route() {
        Route::Login => handle_login_input(app, key),
        Route::Token => handle_token_input(app, key),
    }
}

fn handle_login_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        // Closing the browser tab never reaches us, so Esc abandons the ceremony
        KeyCode::Esc if app.is_signing_in() => app.cancel_sign_in(),
        KeyCode::Esc => {
            app.state = AppState::Quitting;
            return Ok(true);
        }
        KeyCode::Down | KeyCode::Tab => {
            app.login_focus = app.login_focus.next();
        }
        KeyCode::Up | KeyCode::BackTab => {
            app.login_focus = app.login_focus.prev();
        }
        KeyCode::Enter => match app.login_focus {
            LoginFocus::Email => app.login_focus = LoginFocus::Password,
            LoginFocus::Password => app.login_focus = LoginFocus::Submit,
            LoginFocus::ShowPassword => app.toggle_show_password(),
            LoginFocus::Submit => app.submit_login(),
            LoginFocus::Social(provider) => app.press_social(provider),
        },
        KeyCode::Backspace => app.pop_char(),
        KeyCode::Char(' ') if app.login_focus == LoginFocus::ShowPassword => {
            app.toggle_show_password();
        }
        KeyCode::Char(c) => app.push_char(c),
        _ => {}
    }
    Ok(false)
}

fn handle_token_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Char('q') => {
            app.state = AppState::Quitting;
            return Ok(true);
        }
        KeyCode::Esc | KeyCode::Char('b') => app.back_to_login(),
        KeyCode::Char('c') => app.copy_token(Instant::now()),
        KeyCode::Tab | KeyCode::BackTab | KeyCode::Left | KeyCode::Right => {
            app.token_focus = match app.token_focus {
                TokenFocus::Back => TokenFocus::Copy,
                TokenFocus::Copy => TokenFocus::Back,
            };
        }
        KeyCode::Enter | KeyCode::Char(' ') => match app.token_focus {
            TokenFocus::Back => app.back_to_login(),
            TokenFocus::Copy => app.copy_token(Instant::now()),
        },
        _ => {}
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use crossterm::event::KeyModifiers;
    use tokenpeek_core::identity::ProviderSignIn;
    use tokenpeek_core::{AuthError, Clipboard, ClipboardError, IdentityProvider, TokenStore};

    use super::*;
    use crate::app::{SocialProvider, FORM_VALID_MESSAGE};

    struct NeverProvider;

    #[async_trait]
    impl IdentityProvider for NeverProvider {
        fn name(&self) -> &'static str {
            "never"
        }

        async fn sign_in_with_popup(&self) -> Result<ProviderSignIn, AuthError> {
            Err(AuthError::Cancelled)
        }
    }

    struct ParkedProvider;

    #[async_trait]
    impl IdentityProvider for ParkedProvider {
        fn name(&self) -> &'static str {
            "parked"
        }

        async fn sign_in_with_popup(&self) -> Result<ProviderSignIn, AuthError> {
            std::future::pending().await
        }
    }

    struct NullClipboard;

    impl Clipboard for NullClipboard {
        fn set_text(&mut self, _text: &str) -> Result<(), ClipboardError> {
            Ok(())
        }
    }

    fn app_at(route: Route, store: TokenStore) -> App {
        App::new(Arc::new(NeverProvider), Box::new(NullClipboard), store, route)
    }

    fn press(app: &mut App, code: KeyCode) -> bool {
        handle_input(app, KeyEvent::new(code, KeyModifiers::NONE)).unwrap()
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[test]
    fn test_enter_walks_the_form() {
        let mut app = app_at(Route::Login, TokenStore::in_memory());
        type_text(&mut app, "ada@example.com");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.login_focus, LoginFocus::Password);

        type_text(&mut app, "hunter2");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.login_focus, LoginFocus::Submit);

        press(&mut app, KeyCode::Enter);
        assert_eq!(app.status_message.as_deref(), Some(FORM_VALID_MESSAGE));
        assert_eq!(app.route(), Route::Login);
        assert_eq!(app.login_email, "ada@example.com");
        assert_eq!(app.login_password, "hunter2");
    }

    #[test]
    fn test_backspace_edits_focused_field() {
        let mut app = app_at(Route::Login, TokenStore::in_memory());
        type_text(&mut app, "abc");
        press(&mut app, KeyCode::Backspace);
        assert_eq!(app.login_email, "ab");
    }

    #[test]
    fn test_space_toggles_show_password() {
        let mut app = app_at(Route::Login, TokenStore::in_memory());
        app.login_focus = LoginFocus::ShowPassword;
        press(&mut app, KeyCode::Char(' '));
        assert!(app.show_password);
        press(&mut app, KeyCode::Enter);
        assert!(!app.show_password);
    }

    #[test]
    fn test_notice_captures_input_until_dismissed() {
        let mut app = app_at(Route::Login, TokenStore::in_memory());
        app.login_focus = LoginFocus::Social(SocialProvider::Apple);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.state, AppState::ShowingNotice);

        // Typing while the notice is up does nothing
        app.login_focus = LoginFocus::Email;
        type_text(&mut app, "x");
        assert!(app.login_email.is_empty());

        press(&mut app, KeyCode::Enter);
        assert_eq!(app.state, AppState::Normal);
        assert!(app.notice.is_none());
    }

    #[test]
    fn test_esc_quits_from_login() {
        let mut app = app_at(Route::Login, TokenStore::in_memory());
        assert!(press(&mut app, KeyCode::Esc));
        assert_eq!(app.state, AppState::Quitting);
    }

    #[tokio::test]
    async fn test_esc_cancels_pending_sign_in() {
        let mut app = App::new(
            Arc::new(ParkedProvider),
            Box::new(NullClipboard),
            TokenStore::in_memory(),
            Route::Login,
        );
        app.login_focus = LoginFocus::Social(SocialProvider::Google);
        press(&mut app, KeyCode::Enter);
        assert!(app.is_signing_in());

        assert!(!press(&mut app, KeyCode::Esc));
        assert_ne!(app.state, AppState::Quitting);

        for _ in 0..100 {
            app.check_background_tasks();
            if app.state == AppState::ShowingNotice {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert!(!app.is_signing_in());
        assert_eq!(app.notice.as_deref(), Some("Google sign-in was cancelled."));
        assert_eq!(app.route(), Route::Login);

        // Once dismissed, Esc quits again
        press(&mut app, KeyCode::Enter);
        assert!(press(&mut app, KeyCode::Esc));
    }

    #[test]
    fn test_token_screen_keys() {
        let store = TokenStore::in_memory();
        store.set("abc123").unwrap();
        let mut app = app_at(Route::Token, store);
        assert_eq!(app.token_focus, TokenFocus::Copy);

        press(&mut app, KeyCode::Char('c'));
        assert!(app.token_view.is_copied(Instant::now()));

        press(&mut app, KeyCode::Tab);
        assert_eq!(app.token_focus, TokenFocus::Back);

        press(&mut app, KeyCode::Enter);
        assert_eq!(app.route(), Route::Login);
    }

    #[test]
    fn test_q_quits_from_token_screen() {
        let mut app = app_at(Route::Token, TokenStore::in_memory());
        assert!(press(&mut app, KeyCode::Char('q')));
    }
}
