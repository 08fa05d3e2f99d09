use std::any::TypeId;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use apiary_resource::{GroupVersion, Handler};
use pretty_assertions::assert_eq;

use super::*;
use crate::command::{PreparedServer, RunError};
use crate::options::ServerOptions;
use crate::rest::{DefaultStrategy, StaticRestOptions};
use crate::scheme::SchemeError;
use crate::test_fixtures::{Gizmo, Scale, TestStorage, Widget, counting_provider, downcast_store};

fn handler(cmd: &Command, key: &GroupVersionResource) -> Handler {
	cmd.description()
		.handler(key, &StaticRestOptions::default())
		.expect("key is served")
		.expect("handler constructs")
}

/// Resource with an unusable key.
struct Unversioned;

impl Resource for Unversioned {
	fn group_version_resource(&self) -> GroupVersionResource {
		GroupVersionResource::new("apps", "", "unversioned")
	}

	fn kind(&self) -> &str {
		"Unversioned"
	}
}

#[derive(Default)]
struct Recorder {
	servers: Vec<PreparedServer>,
}

impl ServerRunner for Recorder {
	fn run(&mut self, server: PreparedServer) -> Result<(), RunError> {
		self.servers.push(server);
		Ok(())
	}
}

#[test]
fn versions_resolve_to_one_handler() {
	let calls = Arc::new(AtomicUsize::new(0));
	let mut server = ApiServer::new();
	server
		.with_resource_and_handler(&Widget::v1(), counting_provider(&calls))
		.with_resource(&Widget::v2());
	let cmd = server.build().unwrap();

	let v1 = GroupVersionResource::new("apps", "v1", "widgets");
	let v2 = GroupVersionResource::new("apps", "v2", "widgets");
	assert!(Arc::ptr_eq(&handler(&cmd, &v1), &handler(&cmd, &v2)));
	assert_eq!(calls.load(Ordering::SeqCst), 1);
	assert_eq!(cmd.description().version_priorities()["apps"], vec!["v1", "v2"]);
}

#[test]
fn status_is_created_once_and_reused() {
	let mut server = ApiServer::new();
	server.with_resource(&Widget::v1()).with_resource(&Widget::v2());
	let cmd = server.build().unwrap();

	let v1_status = GroupVersionResource::new("apps", "v1", "widgets/status");
	let v2_status = GroupVersionResource::new("apps", "v2", "widgets/status");
	let description = cmd.description();
	assert!(Arc::ptr_eq(
		description.provider(&v1_status).unwrap(),
		description.provider(&v2_status).unwrap()
	));

	let status = handler(&cmd, &v2_status);
	assert_eq!(status.capabilities(), CapabilitySet::GET | CapabilitySet::UPDATE);
	assert_eq!(downcast_store(&status).options.resource_prefix, "/registry/apps/widgets");
	assert!(!Arc::ptr_eq(&status, &handler(&cmd, &GroupVersionResource::new("apps", "v1", "widgets"))));
}

#[test]
fn self_serving_type_is_its_own_handler() {
	let own: Handler = Arc::new(TestStorage::new("Gizmo"));
	let mut server = ApiServer::new();
	server.with_resource(&Gizmo {
		version: "v1",
		handler: Some(own.clone()),
	});
	let cmd = server.build().unwrap();

	let key = GroupVersionResource::new("apps", "v1", "gizmos");
	assert!(Arc::ptr_eq(&handler(&cmd, &key), &own));
	assert!(!cmd.description().contains(&key.subresource("status")));
}

#[test]
fn every_usage_error_is_reported() {
	let mut server = ApiServer::new();
	server
		.with_subresource(&Widget::v1(), "scale", &Scale)
		.with_resource(&Gizmo {
			version: "v1",
			handler: None,
		})
		.with_resource(&Unversioned)
		.with_resource(&Widget::v1());
	assert_eq!(server.errors().len(), 3);

	let err = server.build().unwrap_err();
	let BuildError::Registration(aggregate) = err else {
		panic!("expected registration errors");
	};
	assert_eq!(
		aggregate.errors(),
		&[
			RegistrationError::SubResourceWithoutProvider {
				resource: GroupVersionResource::new("apps", "v1", "widgets/scale"),
			},
			RegistrationError::MissingSelfStorage {
				resource: GroupVersionResource::new("apps", "v1", "gizmos"),
			},
			RegistrationError::InvalidResourceKey {
				resource: GroupVersionResource::new("apps", "", "unversioned"),
				reason: "empty version",
			},
		]
	);
	let message = aggregate.to_string();
	assert!(message.starts_with("3 errors: \n"));
	assert!(message.contains("subresources must be registered with a strategy or handler the first time they are registered"));
}

#[test]
fn scheme_conflict_aborts_build() {
	let mut server = ApiServer::new();
	server
		.with_additional_scheme_installers([SchemeInstaller::new(|scheme| {
			scheme.add_known_type(GroupVersion::new("apps", "v1").with_kind("Widget"), "elsewhere::Widget")
		})])
		.with_resource(&Widget::v1())
		.with_subresource(&Widget::v1(), "scale", &Scale);

	match server.build() {
		Err(BuildError::Scheme { scheme, source }) => {
			assert_eq!(scheme, BASE_SCHEME);
			assert!(matches!(source, SchemeError::KindConflict { .. }));
		}
		other => panic!("expected scheme error, got {other:?}"),
	}
}

#[test]
fn additional_schemes_receive_every_installer() {
	let extra = Scheme::shared("extra");
	let mut server = ApiServer::new();
	server
		.with_additional_schemes_to_build([extra.clone()])
		.with_resource(&Widget::v1())
		.with_resource(&Widget::v2());
	let cmd = server.build().unwrap();

	for scheme in [&extra, cmd.description().scheme()] {
		let scheme = scheme.read();
		assert!(scheme.recognizes(&GroupVersion::new("apps", "v2").with_kind("WidgetList")));
		assert!(scheme.recognizes(&GroupVersion::new("apps", "v1").with_kind("ListOptions")));
		assert!(scheme.has_defaulter(TypeId::of::<Widget>()));
		assert_eq!(scheme.preferred_version("apps"), Some(GroupVersion::new("apps", "v1")));
	}
}

#[test]
fn kube_aware_order_prefers_newest_stable() {
	let mut server = ApiServer::new();
	server
		.with_version_order(VersionOrder::KubeAware)
		.with_resource(&Widget::at("v1beta1"))
		.with_resource(&Widget::v1())
		.with_resource(&Widget::v2());
	let cmd = server.build().unwrap();

	let description = cmd.description();
	assert_eq!(description.version_priorities()["apps"], vec!["v2", "v1", "v1beta1"]);
	assert_eq!(description.preferred_version("apps"), Some(GroupVersion::new("apps", "v2")));
	let groups: Vec<String> = description.group_versions().iter().map(ToString::to_string).collect();
	assert_eq!(groups, vec!["apps/v1beta1", "apps/v1", "apps/v2"]);
}

#[test]
fn duplicate_handlers_follow_policy() {
	let calls = Arc::new(AtomicUsize::new(0));

	let mut lenient = ApiServer::new();
	lenient
		.with_resource(&Widget::v1())
		.with_resource_and_handler(&Widget::v2(), counting_provider(&calls));
	let cmd = lenient.build().unwrap();
	handler(&cmd, &GroupVersionResource::new("apps", "v2", "widgets"));
	assert_eq!(calls.load(Ordering::SeqCst), 0);

	let mut strict = ApiServer::new();
	strict
		.with_duplicate_policy(DuplicatePolicy::Reject)
		.with_resource(&Widget::v1())
		.with_resource(&Widget::v2())
		.with_resource_and_handler(&Widget::v2(), counting_provider(&calls));
	let Err(BuildError::Registration(aggregate)) = strict.build() else {
		panic!("expected a conflicting registration");
	};
	assert_eq!(
		aggregate.errors(),
		&[RegistrationError::ConflictingRegistration {
			resource: GroupVersionResource::new("apps", "v2", "widgets"),
			group_resource: GroupVersionResource::new("apps", "v2", "widgets").group_resource(),
		}]
	);
}

#[test]
fn subresource_strategy_store_uses_request_prefix() {
	let scale = ResourceDescriptor::of(&Scale);
	let mut server = ApiServer::new();
	server
		.with_resource(&Widget::v1())
		.with_subresource_and_strategy(
			&Widget::v1(),
			"scale",
			&Scale,
			Arc::new(DefaultStrategy::for_resource(&scale)),
		)
		.with_resource(&Widget::v2())
		.with_subresource(&Widget::v2(), "scale", &Scale);
	let cmd = server.build().unwrap();

	let v1_scale = GroupVersionResource::new("apps", "v1", "widgets/scale");
	let v2_scale = GroupVersionResource::new("apps", "v2", "widgets/scale");
	let store_handler = handler(&cmd, &v2_scale);
	assert!(Arc::ptr_eq(&store_handler, &handler(&cmd, &v1_scale)));

	let scale_store = downcast_store(&store_handler);
	let widget_handler = handler(&cmd, &GroupVersionResource::new("apps", "v1", "widgets"));
	let widget_store = downcast_store(&widget_handler);
	assert_eq!(scale_store.kind, "Scale");
	assert_eq!(scale_store.options.resource_prefix, "/registry/autoscaling/scales");
	assert_ne!(scale_store.options.resource_prefix, widget_store.options.resource_prefix);
	// subresource request types are not added to the scheme
	assert!(!cmd
		.description()
		.scheme()
		.read()
		.recognizes(&GroupVersion::new("autoscaling", "v1").with_kind("Scale")));
}

#[test]
fn later_self_serving_version_reuses_provider() {
	let own: Handler = Arc::new(TestStorage::new("Gizmo"));
	let mut server = ApiServer::new();
	server
		.with_resource(&Gizmo {
			version: "v1",
			handler: Some(own.clone()),
		})
		.with_resource(&Gizmo {
			version: "v2",
			handler: None,
		});
	assert!(server.errors().is_empty());
	let cmd = server.build().unwrap();

	let v2 = GroupVersionResource::new("apps", "v2", "gizmos");
	assert!(Arc::ptr_eq(&handler(&cmd, &v2), &own));
	assert!(!cmd.description().contains(&v2.subresource("status")));
}

/// Strategy serving cluster-scoped objects.
struct ClusterScoped;

impl Strategy for ClusterScoped {
	fn namespace_scoped(&self) -> bool {
		false
	}
}

#[test]
fn strategy_drives_resource_and_status_stores() {
	let mut server = ApiServer::new();
	server
		.with_resource_and_strategy(&Widget::v1(), Arc::new(ClusterScoped))
		.with_resource(&Widget::v2());
	let cmd = server.build().unwrap();

	let widgets = handler(&cmd, &GroupVersionResource::new("apps", "v2", "widgets"));
	let store = downcast_store(&widgets);
	assert!(!store.namespace_scoped());
	assert!(Arc::ptr_eq(&widgets, &handler(&cmd, &GroupVersionResource::new("apps", "v1", "widgets"))));

	let status = handler(&cmd, &GroupVersionResource::new("apps", "v1", "widgets/status"));
	assert_eq!(status.capabilities(), CapabilitySet::GET | CapabilitySet::UPDATE);
	assert!(!downcast_store(&status).namespace_scoped());
	assert_eq!(downcast_store(&status).options.resource_prefix, "/registry/apps/widgets");
}

#[test]
fn self_storage_wins_over_strategy() {
	let own: Handler = Arc::new(TestStorage::new("Gizmo"));
	let mut server = ApiServer::new();
	server.with_resource_and_strategy(
		&Gizmo {
			version: "v1",
			handler: Some(own.clone()),
		},
		Arc::new(ClusterScoped),
	);
	let cmd = server.build().unwrap();

	let key = GroupVersionResource::new("apps", "v1", "gizmos");
	assert!(Arc::ptr_eq(&handler(&cmd, &key), &own));
	assert!(!cmd.description().contains(&key.subresource("status")));
}

#[test]
fn strategy_for_served_resource_follows_policy() {
	let mut lenient = ApiServer::new();
	lenient
		.with_resource(&Widget::v1())
		.with_resource_and_strategy(&Widget::v2(), Arc::new(ClusterScoped));
	let cmd = lenient.build().unwrap();
	assert!(downcast_store(&handler(&cmd, &GroupVersionResource::new("apps", "v2", "widgets"))).namespace_scoped());

	let mut strict = ApiServer::new();
	strict
		.with_duplicate_policy(DuplicatePolicy::Reject)
		.with_resource(&Widget::v1())
		.with_resource_and_strategy(&Widget::v2(), Arc::new(ClusterScoped));
	let Err(BuildError::Registration(aggregate)) = strict.build() else {
		panic!("expected a conflicting registration");
	};
	let v2 = GroupVersionResource::new("apps", "v2", "widgets");
	assert_eq!(
		aggregate.errors(),
		&[RegistrationError::ConflictingRegistration {
			group_resource: v2.group_resource(),
			resource: v2,
		}]
	);
}

#[test]
fn store_fn_customizes_resource_and_status() {
	let mut server = ApiServer::new();
	server.with_resource_and_storage(
		&Widget::v1(),
		Arc::new(|store: &mut rest::Store| store.options.deletion_workers = 4),
	);
	let cmd = server.build().unwrap();

	for key in [
		GroupVersionResource::new("apps", "v1", "widgets"),
		GroupVersionResource::new("apps", "v1", "widgets/status"),
	] {
		assert_eq!(downcast_store(&handler(&cmd, &key)).options.deletion_workers, 4);
	}
}

#[test]
fn option_and_server_fns_run_in_order() {
	let mut server = ApiServer::new();
	server
		.with_resource(&Widget::v1())
		.disable_delegate_auth()
		.with_options_fns([
			Arc::new(|options: &mut ServerOptions| options.secure_port = 6443) as OptionsFn,
			Arc::new(|options: &mut ServerOptions| options.secure_port += 1) as OptionsFn,
		])
		.with_server_fns([Arc::new(|server: &mut PreparedServer| {
			server.options.bind_address = "127.0.0.1".to_string();
		}) as ServerFn]);
	let cmd = server.build().unwrap();

	let prepared = cmd.prepare(ServerOptions::default()).unwrap();
	assert_eq!(prepared.options.secure_port, 6444);
	assert_eq!(prepared.options.bind_address, "127.0.0.1");
	assert!(prepared.options.authentication_kubeconfig_optional);
	assert!(prepared.options.authorization_kubeconfig_optional);
}

#[test]
fn invalid_options_are_rejected_before_running() {
	let mut server = ApiServer::new();
	server.with_resource(&Widget::v1());
	let cmd = server.build().unwrap();

	let options = ServerOptions {
		etcd_servers: Vec::new(),
		..ServerOptions::default()
	};
	match cmd.prepare(options) {
		Err(CommandError::Options(problems)) => assert_eq!(problems, vec!["at least one etcd server is required"]),
		Err(other) => panic!("expected invalid options, got {other}"),
		Ok(_) => panic!("expected invalid options"),
	}
}

#[test]
fn execute_from_parses_flags_and_installs_apis() {
	let calls = Arc::new(AtomicUsize::new(0));
	let mut server = ApiServer::new();
	server
		.with_resource_and_handler(&Widget::v1(), counting_provider(&calls))
		.with_resource(&Widget::v2());
	let cmd = server.build().unwrap();

	let mut runner = Recorder::default();
	cmd.execute_from(
		[
			"apiserver",
			"--secure-port",
			"8443",
			"--etcd-servers",
			"http://etcd-0:2379,http://etcd-1:2379",
			"--etcd-prefix",
			"/wardle",
		],
		&mut runner,
	)
	.unwrap();

	let [prepared] = runner.servers.as_slice() else {
		panic!("runner invoked once");
	};
	assert_eq!(prepared.options.secure_port, 8443);
	assert_eq!(prepared.options.etcd_servers, vec!["http://etcd-0:2379", "http://etcd-1:2379"]);

	let installed = prepared.install_apis().unwrap();
	let keys: Vec<String> = installed.iter().map(|(key, _)| key.to_string()).collect();
	assert_eq!(
		keys,
		vec![
			"apps/v1, Resource=widgets",
			"apps/v2, Resource=widgets",
			"apps/v2, Resource=widgets/status",
		]
	);
	assert_eq!(calls.load(Ordering::SeqCst), 1);

	let err = cmd.execute_from(["apiserver", "--secure-port", "nope"], &mut runner).unwrap_err();
	assert!(matches!(err, CommandError::Args(_)));
	assert_eq!(runner.servers.len(), 1);
}

#[test]
fn openapi_definitions_reach_description() {
	let mut server = ApiServer::new();
	server.with_resource(&Widget::v1()).with_openapi_definitions(
		"widgets",
		"1.0",
		Arc::new(|| {
			let mut defs = BTreeMap::new();
			defs.insert("apps.v1.Widget".to_string(), serde_json::json!({ "type": "object" }));
			defs
		}),
	);
	let cmd = server.build().unwrap();

	let openapi = cmd.description().openapi().expect("definitions recorded");
	assert_eq!((openapi.title.as_str(), openapi.version.as_str()), ("widgets", "1.0"));
	assert_eq!(openapi.definitions()["apps.v1.Widget"]["type"], "object");
}

#[test]
fn builders_do_not_share_state() {
	let mut first = ApiServer::new();
	first.with_resource(&Widget::v1());
	let second = ApiServer::new();

	assert_eq!(first.registry().len(), 2);
	assert!(second.registry().is_empty());
	assert!(!Arc::ptr_eq(first.scheme(), second.scheme()));
}
