use ponte::error::DeployError;

#[test]
fn display_malformed_route() {
    let err = DeployError::MalformedRoute {
        operation: "dronestatusGET".into(),
        reason: "parameter 'id' does not appear in the URL template".into(),
    };
    assert_eq!(
        err.to_string(),
        "malformed route 'dronestatusGET': parameter 'id' does not appear in the URL template"
    );
}

#[test]
fn display_missing_credential() {
    let err = DeployError::MissingCredential("dronestatusdotnet".into());
    assert_eq!(err.to_string(), "missing credential for backend 'dronestatusdotnet'");
}

#[test]
fn display_unresolved_token() {
    let err = DeployError::UnresolvedToken {
        path: "js/config.js".into(),
        token: "APP_ID".into(),
    };
    assert_eq!(err.to_string(), "unresolved token [APP_ID] in js/config.js");
}

#[test]
fn display_upstream_resolution() {
    let err = DeployError::upstream("cdn:Endpoint::drone-endpoint", "quota exceeded");
    assert_eq!(
        err.to_string(),
        "upstream resolution failed for cdn:Endpoint::drone-endpoint: quota exceeded"
    );
}

#[test]
fn display_duplicate_secret() {
    let err = DeployError::DuplicateSecret("fn-key".into());
    assert_eq!(
        err.to_string(),
        "secret 'fn-key' is already bound to a different producer"
    );
}

#[test]
fn display_invalid_config() {
    let err = DeployError::InvalidConfig("no API configured".into());
    assert_eq!(err.to_string(), "invalid configuration: no API configured");
}

#[test]
fn display_file_not_found() {
    let err = DeployError::FileNotFound("frontend/dist".into());
    assert_eq!(err.to_string(), "file not found: frontend/dist");
}

#[test]
fn display_other() {
    let err = DeployError::Other("custom error".into());
    assert_eq!(err.to_string(), "custom error");
}

#[test]
fn from_io_error() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
    let err: DeployError = io_err.into();
    assert!(matches!(err, DeployError::Io(_)));
    assert_eq!(err.to_string(), "file missing");
}

#[test]
fn from_json_error() {
    let json_err = serde_json::from_str::<Vec<u64>>("invalid").unwrap_err();
    let err: DeployError = json_err.into();
    assert!(matches!(err, DeployError::Json(_)));
}

#[test]
fn from_yaml_error() {
    let yaml_err = serde_yaml::from_str::<Vec<u64>>("{not: [a list").unwrap_err();
    let err: DeployError = yaml_err.into();
    assert!(matches!(err, DeployError::Yaml(_)));
}

#[test]
fn clones_share_the_source() {
    let err: DeployError = std::io::Error::other("disk full").into();
    let copy = err.clone();
    assert_eq!(err.to_string(), copy.to_string());
}
