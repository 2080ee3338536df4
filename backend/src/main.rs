fn main() {
    sql_agent_desk_lib::run()
}
