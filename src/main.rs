fn main() -> anyhow::Result<()> {
    aquawatch_lib::run()
}
