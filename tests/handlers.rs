use anyhow::Result;
use convert_yaml::converters::{
    EnumConverter, convert_handlers, expiration_to_duration, idle_timeout_to_duration,
    latency_to_duration,
};
use convert_yaml::{Error, to_value};
use indoc::indoc;
use serde_json::json;

#[test]
fn handlers_are_nested_by_type() -> Result<()> {
    let yaml = indoc! {r#"
        runtime: python27
        handlers:
        - urlRegex: /favicon\.ico
          path: static/favicon.ico
          uploadPathRegex: static/favicon\.ico
          mimeType: image/x-icon
        - urlRegex: /assets
          staticDir: assets/
          expiration: 1d 12h
        - urlRegex: /.*
          scriptPath: main.app
          login: LOGIN_REQUIRED
          securityLevel: SECURE_ALWAYS
    "#};
    let mut value = to_value(yaml)?;
    convert_handlers(&mut value)?;
    assert_eq!(
        serde_json::to_value(&value["handlers"])?,
        json!([
            {
                "staticFiles": {
                    "path": "static/favicon.ico",
                    "uploadPathRegex": "static/favicon\\.ico",
                    "mimeType": "image/x-icon",
                },
                "urlRegex": "/favicon\\.ico",
            },
            {
                "staticFiles": {
                    "path": "assets/\\1",
                    "uploadPathRegex": "assets/.*",
                    "expiration": "1d 12h",
                },
                "urlRegex": "/assets/(.*)",
            },
            {
                "script": {"scriptPath": "main.app"},
                "urlRegex": "/.*",
                "login": "LOGIN_REQUIRED",
                "securityLevel": "SECURE_ALWAYS",
            },
        ])
    );
    assert_eq!(value["runtime"], json!("python27"));
    Ok(())
}

#[test]
fn app_yaml_handlers_are_renamed_and_nested() -> Result<()> {
    let yaml = indoc! {r#"
        runtime: python27
        api_version: 1
        threadsafe: true
        handlers:
        - url: /favicon\.ico
          static_files: static/favicon.ico
          upload: static/favicon\.ico
          mime_type: image/x-icon
          expiration: 1d
        - url: /static
          static_dir: static
          secure: always
        - url: /admin/.*
          script: admin.app
          login: admin
          auth_fail_action: unauthorized
        - url: /.*
          script: main.app
          redirect_http_response_code: 301
    "#};
    let mut value = to_value(yaml)?;
    convert_handlers(&mut value)?;
    assert_eq!(
        value["handlers"],
        json!([
            {
                "staticFiles": {
                    "path": "static/favicon.ico",
                    "uploadPathRegex": "static/favicon\\.ico",
                    "expiration": "86400s",
                    "mimeType": "image/x-icon",
                },
                "urlRegex": "/favicon\\.ico",
            },
            {
                "staticFiles": {"path": "static/\\1", "uploadPathRegex": "static/.*"},
                "urlRegex": "/static/(.*)",
                "securityLevel": "SECURE_ALWAYS",
            },
            {
                "script": {"scriptPath": "admin.app"},
                "urlRegex": "/admin/.*",
                "login": "LOGIN_ADMIN",
                "authFailAction": "AUTH_FAIL_ACTION_UNAUTHORIZED",
            },
            {
                "script": {"scriptPath": "main.app"},
                "urlRegex": "/.*",
                "redirectHttpResponseCode": "REDIRECT_HTTP_RESPONSE_CODE_301",
            },
        ])
    );
    assert_eq!(value["api_version"], json!(1));
    Ok(())
}

#[test]
fn legacy_expiration_errors_name_the_entry() -> Result<()> {
    let mut value = to_value("handlers:\n- url: /a\n  static_dir: a\n  expiration: soon\n")?;
    let err = convert_handlers(&mut value).unwrap_err();
    assert_eq!(err.path().unwrap().to_string(), "handlers[0]");
    assert!(err.to_string().contains("unrecognized expiration: soon"), "{err}");
    Ok(())
}

#[test]
fn common_fields_follow_the_type_object() -> Result<()> {
    let mut value = to_value("handlers:\n- login: LOGIN_ADMIN\n  urlRegex: /admin\n  scriptPath: admin.app\n")?;
    convert_handlers(&mut value)?;
    assert_eq!(
        serde_json::to_string(&value)?,
        r#"{"handlers":[{"script":{"scriptPath":"admin.app"},"urlRegex":"/admin","login":"LOGIN_ADMIN"}]}"#
    );
    Ok(())
}

#[test]
fn handler_errors_name_the_entry() -> Result<()> {
    let mut value = to_value("handlers:\n- scriptPath: a\n- [not, a, mapping]\n")?;
    let err = convert_handlers(&mut value).unwrap_err();
    assert!(matches!(err, Error::Conversion { .. }), "{err:?}");
    assert_eq!(err.path().unwrap().to_string(), "handlers[1]");
    assert!(err.to_string().starts_with("expected a mapping"), "{err}");
    Ok(())
}

#[test]
fn field_converters_match_app_engine_semantics() {
    assert_eq!(EnumConverter::new("REDIRECT_HTTP_RESPONSE_CODE").unwrap().convert("301"), "REDIRECT_HTTP_RESPONSE_CODE_301");
    assert_eq!(latency_to_duration("30ms").unwrap().as_deref(), Some("0.03s"));
    assert_eq!(idle_timeout_to_duration("2m").unwrap(), "120s");
    assert_eq!(expiration_to_duration("1d 12h").unwrap(), "129600s");
}
