use crate::cli::{non_blank, Cli};
use crate::error::Result;

/// Builds the parameter string for HyperVServer.ps1: the three required
/// parameters, then whichever optional ones were supplied.
pub fn script_arguments(cli: &Cli) -> Result<String> {
    let mut args = String::new();
    push(&mut args, "ComputerName", cli.computer_name()?);
    push(&mut args, "Action", cli.action()?);
    push(&mut args, "VMName", cli.vm()?);

    let optional = [
        ("CheckpointName", &cli.checkpoint_name),
        (
            "StartVMWaitTimeBasedCheckInterval",
            &cli.start_vm_wait_time_based_check_interval,
        ),
        ("StartVMStatusCheckType", &cli.start_vm_status_check_type),
        (
            "HyperV_StartVMWaitingNumberOfStatusNotifications",
            &cli.start_vm_waiting_number_of_status_notifications,
        ),
        (
            "HyperV_StartVMAppHealthyHeartbeatTimeout",
            &cli.start_vm_app_healthy_heartbeat_timeout,
        ),
        ("HyperV_PsModuleVersion", &cli.ps_module_version),
    ];
    for (name, value) in optional {
        if let Some(value) = non_blank(value) {
            push(&mut args, name, value);
        }
    }

    Ok(args)
}

fn push(args: &mut String, name: &str, value: &str) {
    args.push_str(" -");
    args.push_str(name);
    args.push(' ');
    args.push_str(value);
}
