//! Snapshot tests for resolved document output

use std::process::Command;

fn resolve_json(fixture: &str) -> Vec<serde_json::Value> {
    let path = format!("{}/../../fixtures/{}/graph.yaml", env!("CARGO_MANIFEST_DIR"), fixture);
    let output = Command::new(env!("CARGO_BIN_EXE_kanvas"))
        .args(["resolve", &path, "--json"])
        .output()
        .expect("Failed to execute kanvas");
    assert!(output.status.success());
    serde_json::from_str(&String::from_utf8_lossy(&output.stdout)).expect("valid JSON")
}

#[test]
fn test_service_document_keeps_authoring_order() {
    let docs = resolve_json("clean");
    insta::assert_json_snapshot!(docs[1], @r#"
    {
      "apiVersion": "v1",
      "kind": "Service",
      "metadata": {
        "name": "web",
        "namespace": "site"
      },
      "spec": {
        "selector": {
          "app": "web"
        },
        "ports": [
          {
            "port": 80,
            "targetPort": 8080
          }
        ]
      }
    }
    "#);
}

#[test]
fn test_ingress_plugin_document() {
    let docs = resolve_json("shop");
    insta::assert_json_snapshot!(docs.last().unwrap(), @r#"
    {
      "apiVersion": "networking.k8s.io/v1",
      "kind": "Ingress",
      "metadata": {
        "name": "api-ingress",
        "namespace": "shop"
      },
      "spec": {
        "ingressClassName": "nginx",
        "rules": [
          {
            "host": "shop.example.com",
            "http": {
              "paths": [
                {
                  "path": "/",
                  "pathType": "Prefix",
                  "backend": {
                    "service": {
                      "name": "api",
                      "port": {
                        "number": 80
                      }
                    }
                  }
                }
              ]
            }
          }
        ]
      }
    }
    "#);
}
