use ponte::deferred::{self, Deferred};
use ponte::error::DeployError;

#[tokio::test]
async fn joined_template_line() {
    let url = Deferred::from_future("gateway", async { Ok("https://host/api/".to_string()) });
    let tenant = Deferred::from_future("tenant", async { Ok("tenant-123".to_string()) });

    let line =
        deferred::join(url, tenant).map(|(url, tenant)| format!("url={url};tenant={tenant}"));

    assert_eq!(
        line.producers().collect::<Vec<_>>(),
        vec!["gateway", "tenant"]
    );
    assert_eq!(
        line.resolve().await.unwrap(),
        "url=https://host/api/;tenant=tenant-123"
    );
}

#[tokio::test]
async fn failure_is_never_defaulted() {
    let url: Deferred<String> = Deferred::failed(DeployError::upstream("gateway", "timeout"));
    let tenant = Deferred::resolved("tenant-123".to_string());

    let line = deferred::join(url, tenant).map(|(url, tenant)| format!("{url}{tenant}"));

    let err = line.resolve().await.unwrap_err();
    assert_eq!(err.to_string(), "upstream resolution failed for gateway: timeout");
}

#[tokio::test]
async fn secrecy_survives_every_combinator() {
    let key = Deferred::resolved("k".to_string()).secret();
    let plain = Deferred::resolved(1_u8);

    let derived = deferred::join3(key.clone(), plain.clone(), plain)
        .map(|(k, a, b)| format!("{k}{a}{b}"))
        .try_map(|s| Ok(s.len()));
    let all = deferred::join_all(vec![Deferred::resolved("x".to_string()), key]);

    assert!(derived.is_secret());
    assert!(all.is_secret());
    assert_eq!(derived.resolve().await.unwrap(), 3);
}
